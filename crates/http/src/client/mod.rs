//! Portal HTTP client
//!
//! Every outbound call in the portal goes through one [`PortalClient`]. The
//! client owns a single `reqwest::Client` plus an ordered chain of
//! [`Middleware`]; extending the chain with [`PortalClient::with_middleware`]
//! yields a new handle that shares the same connection pool.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod refresh;
pub mod service;
pub mod token_store;

pub use context::{ClientContext, ContextHeaders, RequestContext};
pub use error::ClientError;
pub use interceptor::{AuthInterceptor, SessionHooks};
pub use refresh::{Flight, RefreshGuard};
pub use service::AuthService;
pub use token_store::{CookiePolicy, CookieTokenStore, SameSite, StoredTokens, TokenStore, TtlPolicy};

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Request, Response};
use std::sync::Arc;
use std::time::Duration;

/// A step in the outbound request chain.
///
/// Implementations may rewrite the request, short-circuit, or call
/// [`Next::run`] more than once (a retry clones the request first).
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, ClientError>;
}

/// The remainder of the chain after the current middleware
#[derive(Clone, Copy)]
pub struct Next<'a> {
    client: &'a Client,
    middleware: &'a [Arc<dyn Middleware>],
}

impl Next<'_> {
    /// Hand the request to the next middleware, or dispatch it when the chain
    /// is exhausted. Non-2xx responses come back as [`ClientError`].
    pub async fn run(self, request: Request) -> Result<Response, ClientError> {
        if let Some((current, rest)) = self.middleware.split_first() {
            let next = Next {
                client: self.client,
                middleware: rest,
            };
            return current.handle(request, next).await;
        }

        let response = self.client.execute(request).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::from_status(status, body))
        }
    }
}

/// Portal API client
#[derive(Clone)]
pub struct PortalClient {
    client: Client,
    base_url: String,
    middleware: Arc<[Arc<dyn Middleware>]>,
}

impl PortalClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> PortalClientBuilder {
        PortalClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of middleware layers in the chain
    pub fn middleware_len(&self) -> usize {
        self.middleware.len()
    }

    /// New handle sharing this client's transport with `middleware` appended
    /// to the end of the chain
    #[must_use]
    pub fn with_middleware(&self, middleware: impl Middleware) -> Self {
        let mut chain: Vec<Arc<dyn Middleware>> = self.middleware.iter().cloned().collect();
        chain.push(Arc::new(middleware));

        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            middleware: chain.into(),
        }
    }

    /// Resolve a route against the base URL. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Create a request builder for a route
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Run a request through the middleware chain
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let request = request.build()?;
        let next = Next {
            client: &self.client,
            middleware: &self.middleware,
        };
        next.run(request).await
    }

    /// Run a request through the chain and decode the JSON body.
    ///
    /// An empty body decodes as JSON `null`.
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            Ok(serde_json::from_slice(b"null")?)
        } else {
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("base_url", &self.base_url)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Builder for PortalClient
#[derive(Default)]
pub struct PortalClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl PortalClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Append a middleware to the chain; layers run in insertion order
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<PortalClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        } else {
            client_builder = client_builder.user_agent("portal-client/0.1.0");
        }

        let client = client_builder.build()?;

        Ok(PortalClient {
            client,
            base_url,
            middleware: self.middleware.into(),
        })
    }
}
