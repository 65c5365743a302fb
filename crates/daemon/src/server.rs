//! Server setup and configuration module

use crate::config::Settings;
use crate::error::Result;
use axum::http::header;
use portal_http::client::{ClientContext, ContextHeaders, PortalClient};
use portal_http::services::SessionStore;
use portal_http::{AppState, routes};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::sensitive_headers::{
    SetSensitiveRequestHeadersLayer, SetSensitiveResponseHeadersLayer,
};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Server configuration builder
pub struct ServerBuilder {
    settings: Settings,
}

impl ServerBuilder {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Client for the identity API, carrying the portal context headers
    pub fn build_upstream_client(&self) -> Result<PortalClient> {
        let upstream = &self.settings.upstream;
        let context = Arc::new(ClientContext::new(
            upstream.domain_id.clone(),
            upstream.locale.clone(),
        ));

        info!(
            base_url = %upstream.api_base_url,
            domain_id = %upstream.domain_id,
            "Configuring identity API client"
        );

        let client = PortalClient::builder()
            .base_url(upstream.api_base_url.clone())
            .timeout(self.settings.upstream_timeout())
            .with(ContextHeaders::new(context))
            .build()?;
        Ok(client)
    }

    /// Build the app state
    pub fn build_app_state(&self) -> Result<AppState> {
        let upstream = self.build_upstream_client()?;
        let sessions = SessionStore::new(self.settings.session_config()?)?;
        let csrf = self.settings.csrf_config();

        if csrf.domain_url.is_none() && csrf.allowed_origins.is_empty() {
            tracing::warn!("No CSRF origins configured; state-changing requests will be rejected");
        }

        Ok(AppState::new(upstream, sessions, csrf))
    }

    /// Routes with request tracing; credentials never reach the logs
    pub fn build_router(state: AppState) -> axum::Router {
        routes::app(state).layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new([
                    header::AUTHORIZATION,
                    header::COOKIE,
                ]))
                .layer(SetSensitiveResponseHeadersLayer::new([header::SET_COOKIE]))
                .layer(TraceLayer::new_for_http()),
        )
    }

    pub fn build(&self) -> Result<axum::Router> {
        Ok(Self::build_router(self.build_app_state()?))
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.build()?;
        info!(address = %listener.local_addr()?, "Portal edge listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.upstream.api_base_url = "http://127.0.0.1:9".to_string();
        settings.session.secret = Some("test-secret".to_string());
        settings.csrf.domain_url = Some("http://localhost".to_string());
        settings
    }

    #[tokio::test]
    async fn test_router_builds() {
        assert!(ServerBuilder::new(test_settings()).build().is_ok());
    }

    #[tokio::test]
    async fn test_missing_secret_fails_state() {
        let mut settings = test_settings();
        settings.session.secret = None;

        assert!(ServerBuilder::new(settings).build_app_state().is_err());
    }
}
