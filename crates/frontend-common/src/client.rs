//! Client configuration and initialization
//!
//! A [`Portal`] is built once per runtime. It owns the single shared
//! [`PortalClient`] every feature module issues requests through.

use crate::auth::context::SessionSynchronizer;
use crate::auth::guard::{GuardDecision, RouteGuard};
use crate::config::PortalConfig;
use crate::navigation::Navigator;
use crate::services::config::{ConfigCache, ConfigInitError};
use portal_core::SiteConfig;
pub use portal_http::client::error::ClientError;
use portal_http::client::{
    AuthInterceptor, AuthService, ClientContext, ContextHeaders, PortalClient, TokenStore,
};
use std::sync::Arc;

pub struct Portal {
    config: PortalConfig,
    context: Arc<ClientContext>,
    client: PortalClient,
    session: Arc<SessionSynchronizer>,
    site: ConfigCache,
    guard: RouteGuard,
    navigator: Arc<dyn Navigator>,
}

impl Portal {
    pub fn new(
        config: PortalConfig,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let context = Arc::new(
            ClientContext::new(config.domain_id.clone(), config.default_locale.clone())
                .with_mobile_breakpoint(config.mobile_breakpoint),
        );

        // Identity calls go out beneath the interceptor so refresh cannot recurse
        let base = PortalClient::builder()
            .base_url(config.api_base_url.clone())
            .timeout(config.timeout())
            .with(ContextHeaders::new(context.clone()))
            .build()?;

        let guard = RouteGuard::from_config(&config);
        let service = AuthService::new(base.clone(), store).with_ttl(config.ttl);
        let session = Arc::new(SessionSynchronizer::new(
            service,
            navigator.clone(),
            guard.clone(),
        ));
        let client = base.with_middleware(AuthInterceptor::new(session.clone()));
        let site = ConfigCache::new(client.clone());

        Ok(Self {
            config,
            context,
            client,
            session,
            site,
            guard,
            navigator,
        })
    }

    /// Load site configuration, then restore any stored session.
    ///
    /// Configuration failure is fatal; a rejected session is not.
    pub async fn start(&self) -> Result<Arc<SiteConfig>, ConfigInitError> {
        let site = self.site.initialize(&self.context.locale()).await?;
        self.session.initialize().await;
        Ok(site)
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    /// The shared client, with context headers and the auth interceptor
    pub fn client(&self) -> &PortalClient {
        &self.client
    }

    pub fn session(&self) -> &Arc<SessionSynchronizer> {
        &self.session
    }

    pub fn site(&self) -> &ConfigCache {
        &self.site
    }

    pub fn route_guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// Navigate to `path`, or wherever the route guard sends the user instead
    pub fn navigate(&self, path: &str) -> GuardDecision {
        let decision = self.guard.evaluate(path, self.session.is_authenticated());
        match &decision {
            GuardDecision::Allow => self.navigator.navigate(path),
            GuardDecision::Redirect(to) => {
                tracing::debug!(from = path, %to, "Navigation redirected");
                self.navigator.navigate(to);
            }
        }
        decision
    }

    /// Switch the request locale and drop configuration cached for the old one
    pub fn set_locale(&self, locale: impl Into<String>) {
        self.context.set_locale(locale);
        self.site.reset();
    }
}

impl std::fmt::Debug for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portal")
            .field("client", &self.client)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
