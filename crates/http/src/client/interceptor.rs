//! Bearer injection and the refresh-and-retry protocol

use super::{ClientError, Flight, Middleware, Next, RefreshGuard};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Request, Response, Url};
use std::sync::Arc;

/// Routes whose 401 is final. Matched against the trailing segments of the
/// URL path so the edge routes (`/api/auth/refresh`) are covered too.
pub const EXEMPT_ROUTES: &[&str] = &["auth/refresh", "auth/login"];

/// How the interceptor reaches the session layer
#[async_trait]
pub trait SessionHooks: Send + Sync + 'static {
    /// Current non-expired access token
    fn access_token(&self) -> Option<String>;

    /// Obtain a new access token and adopt it. Returns whether it worked.
    async fn refresh(&self) -> bool;

    /// Called once per failed refresh, by the request that started it, before
    /// the original error is returned
    async fn on_refresh_failed(&self);
}

/// Middleware implementing bearer injection plus single-flight refresh on 401
pub struct AuthInterceptor {
    hooks: Arc<dyn SessionHooks>,
    guard: RefreshGuard,
}

impl AuthInterceptor {
    pub fn new(hooks: Arc<dyn SessionHooks>) -> Self {
        Self::with_guard(hooks, RefreshGuard::new())
    }

    /// Share an existing guard, e.g. between several client handles
    pub fn with_guard(hooks: Arc<dyn SessionHooks>, guard: RefreshGuard) -> Self {
        Self { hooks, guard }
    }

    pub fn guard(&self) -> &RefreshGuard {
        &self.guard
    }

    pub fn is_exempt(url: &Url) -> bool {
        let path = url.path().trim_end_matches('/');
        EXEMPT_ROUTES.iter().any(|route| {
            path.strip_suffix(route)
                .is_some_and(|prefix| prefix.is_empty() || prefix.ends_with('/'))
        })
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), ClientError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ClientError::Configuration(format!("invalid access token: {e}")))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[async_trait]
impl Middleware for AuthInterceptor {
    async fn handle(&self, mut request: Request, next: Next<'_>) -> Result<Response, ClientError> {
        let caller_authorized = request.headers().contains_key(AUTHORIZATION);
        let mut sent_token = None;

        if !caller_authorized {
            if let Some(token) = self.hooks.access_token() {
                set_bearer(&mut request, &token)?;
                sent_token = Some(token);
            }
        }

        let exempt = Self::is_exempt(request.url());
        let retry = if exempt { None } else { request.try_clone() };
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let error = match next.run(request).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        if exempt || !error.is_unauthorized() {
            return Err(error);
        }
        let Some(mut retry) = retry else {
            tracing::warn!(%method, %path, "Streaming request body cannot be retried after 401");
            return Err(error);
        };

        tracing::debug!(%method, %path, "Received 401, refreshing access token");

        // A refresh that settled after this request left already rotated the token
        let current = self.hooks.access_token();
        let flight = if sent_token.is_some() && current.is_some() && current != sent_token {
            Flight {
                refreshed: true,
                initiated: false,
            }
        } else {
            let hooks = Arc::clone(&self.hooks);
            self.guard
                .join(move || async move { hooks.refresh().await })
                .await
        };

        if !flight.refreshed {
            if flight.initiated {
                tracing::warn!(%method, %path, "Token refresh failed, ending session");
                self.hooks.on_refresh_failed().await;
            } else {
                tracing::debug!(%method, %path, "Joined refresh failed");
            }
            return Err(error);
        }

        if let Some(token) = self.hooks.access_token() {
            set_bearer(&mut retry, &token)?;
        }

        tracing::debug!(%method, %path, "Retrying request with refreshed token");
        next.run(retry).await
    }
}
