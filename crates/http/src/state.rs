//! Application state management

use crate::client::PortalClient;
use crate::middleware::CsrfConfig;
use crate::services::SessionStore;
use std::sync::Arc;

/// Shared application state
///
/// Cloned into every handler. The upstream client carries the context
/// headers but no auth interceptor: the edge forwards whatever credentials
/// the session holds and reports failures to the browser.
#[derive(Clone)]
pub struct AppState {
    /// Client for the identity API
    pub upstream: PortalClient,
    /// Encrypted session cookie store
    pub sessions: Arc<SessionStore>,
    /// Origin allow-list for state-changing requests
    pub csrf: Arc<CsrfConfig>,
}

impl AppState {
    pub fn new(upstream: PortalClient, sessions: SessionStore, csrf: CsrfConfig) -> Self {
        Self {
            upstream,
            sessions: Arc::new(sessions),
            csrf: Arc::new(csrf),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("upstream", &self.upstream)
            .field("sessions", &self.sessions)
            .field("csrf", &self.csrf)
            .finish()
    }
}
