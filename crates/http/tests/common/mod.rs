//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use portal_core::{Clock, ManualClock};
use portal_http::client::token_store::{ACCESS_TOKEN, SESSION_ID, TOKEN_ID};
use portal_http::client::{
    AuthInterceptor, AuthService, ClientContext, ContextHeaders, CookieTokenStore, PortalClient,
    SessionHooks, StoredTokens, TokenStore, TtlPolicy,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Minimal session layer: the store is the whole session
pub struct TestSession {
    pub store: Arc<CookieTokenStore>,
    pub service: AuthService,
    pub failures: AtomicUsize,
}

impl TestSession {
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionHooks for TestSession {
    fn access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    async fn refresh(&self) -> bool {
        self.service.refresh().await.success
    }

    async fn on_refresh_failed(&self) {
        self.store.clear_all();
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub base: PortalClient,
    pub client: PortalClient,
    pub session: Arc<TestSession>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(base_url: &str) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(CookieTokenStore::new(clock.clone() as Arc<dyn Clock>));
        let context = Arc::new(ClientContext::new("7", "en"));

        let base = PortalClient::builder()
            .base_url(base_url)
            .with(ContextHeaders::new(context))
            .build()
            .unwrap();
        let service = AuthService::new(base.clone(), store.clone() as Arc<dyn TokenStore>);
        let session = Arc::new(TestSession {
            store,
            service,
            failures: AtomicUsize::new(0),
        });
        let client = base.with_middleware(AuthInterceptor::new(session.clone()));

        Self {
            base,
            client,
            session,
            clock,
        }
    }

    /// Seed the store as if a login had happened
    pub fn signed_in(self, access_token: &str) -> Self {
        self.session.store.persist(
            &StoredTokens {
                access_token: Some(access_token.to_string()),
                expires_in: Some(3600),
                token_id: Some("tid-1".to_string()),
                session_id: Some("sid-1".to_string()),
            },
            &TtlPolicy::default(),
        );
        self
    }

    pub fn token(&self, name: &str) -> Option<String> {
        self.session.store.read(name)
    }

    pub fn is_signed_out(&self) -> bool {
        [ACCESS_TOKEN, TOKEN_ID, SESSION_ID]
            .iter()
            .all(|name| self.token(name).is_none())
    }
}

/// Identity API token grant body
pub fn grant(access_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "user": {
            "id": 42,
            "username": "player1",
            "balance": "100.00",
            "currency": "IDR",
            "token_id": "tid-1",
            "session_id": "sid-1"
        }
    })
}
