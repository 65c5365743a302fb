//! Origin allow-list check for state-changing requests

use crate::error::HttpError;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use url::{Origin, Url};

/// Origins allowed to issue state-changing requests
#[derive(Debug, Clone, Default)]
pub struct CsrfConfig {
    /// Public URL the portal is served from
    pub domain_url: Option<String>,
    /// Additional origins, e.g. local development servers
    pub allowed_origins: Vec<String>,
}

impl CsrfConfig {
    pub fn new(domain_url: impl Into<String>) -> Self {
        Self {
            domain_url: Some(domain_url.into()),
            allowed_origins: Vec::new(),
        }
    }

    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    fn allowed(&self) -> impl Iterator<Item = Origin> + '_ {
        self.domain_url
            .iter()
            .chain(self.allowed_origins.iter())
            .filter_map(|allowed| Url::parse(allowed).ok())
            .map(|url| url.origin())
    }

    /// Exact origin match; prefixes such as `https://portal.example.com.evil.net` fail
    fn matches(&self, value: &str) -> bool {
        let Ok(url) = Url::parse(value) else {
            return false;
        };
        let origin = url.origin();
        origin.is_tuple() && self.allowed().any(|allowed| allowed == origin)
    }

    /// `host[:port]` of the configured domain
    fn domain_authority(&self) -> Option<String> {
        let url = Url::parse(self.domain_url.as_deref()?).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Whether a request may proceed.
    ///
    /// A present `Origin` decides alone, then `Referer`. `Host` is consulted
    /// only when the client sent neither.
    pub fn permits(&self, method: &Method, headers: &HeaderMap) -> bool {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            return true;
        }

        let value_of = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

        if let Some(origin) = value_of(header::ORIGIN) {
            return self.matches(origin);
        }
        if let Some(referer) = value_of(header::REFERER) {
            return self.matches(referer);
        }

        match (value_of(header::HOST), self.domain_authority()) {
            (Some(host), Some(authority)) => host.eq_ignore_ascii_case(&authority),
            _ => false,
        }
    }
}

/// Reject cross-origin state-changing requests with 403
pub async fn csrf_middleware(
    State(config): State<Arc<CsrfConfig>>,
    req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    if config.permits(req.method(), req.headers()) {
        return Ok(next.run(req).await);
    }

    warn!(
        method = %req.method(),
        path = %req.uri().path(),
        "CSRF validation failed"
    );
    Err(HttpError::Forbidden("CSRF validation failed".to_string()))
}
