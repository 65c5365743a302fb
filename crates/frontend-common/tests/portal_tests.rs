//! Session synchronizer, config cache and route guard wired through a Portal

use futures::future::join_all;
use portal_core::{Clock, LoginPayload, ManualClock};
use portal_frontend_common::{
    GuardDecision, MemoryNavigator, Navigator, Portal, PortalConfig, SessionPhase,
};
use portal_http::client::token_store::ACCESS_TOKEN;
use portal_http::client::{CookieTokenStore, StoredTokens, TokenStore, TtlPolicy};
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    portal: Portal,
    navigator: Arc<MemoryNavigator>,
    store: Arc<CookieTokenStore>,
}

impl Fixture {
    fn new(base_url: &str, start_at: &str) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let store = Arc::new(CookieTokenStore::new(clock));
        let navigator = Arc::new(MemoryNavigator::new(start_at));
        let portal = Portal::new(
            PortalConfig::new(base_url, "7"),
            store.clone(),
            navigator.clone(),
        )
        .unwrap();

        Self {
            portal,
            navigator,
            store,
        }
    }

    /// A previous visit whose access token has since lapsed
    fn with_correlation_tokens_only(self) -> Self {
        self.store.persist(
            &StoredTokens {
                token_id: Some("tid-1".to_string()),
                session_id: Some("sid-1".to_string()),
                ..StoredTokens::default()
            },
            &TtlPolicy::default(),
        );
        self
    }

    /// Tokens as a previous visit would have left them
    fn with_stored_session(self, access_token: &str) -> Self {
        self.store.persist(
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
}

fn user() -> Value {
    json!({
        "id": 42,
        "username": "player1",
        "balance": "100.00",
        "token_id": "tid-1",
        "session_id": "sid-1"
    })
}

fn grant(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "user": user()
    })
}

fn credentials() -> LoginPayload {
    LoginPayload {
        email: "player1@example.com".to_string(),
        password: "hunter22".to_string(),
    }
}

#[tokio::test]
async fn test_login_then_current_user_is_the_same_identity() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant("access-1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/login");
    let session = fixture.portal.session();
    let mut updates = session.subscribe();

    let outcome = session.login(&credentials()).await;

    assert!(outcome.success);
    assert_eq!(session.current_user(), outcome.data);
    assert_eq!(session.current_user().unwrap().username(), "player1");
    assert_eq!(session.session().access_token.as_deref(), Some("access-1"));

    let seen = updates.borrow_and_update().clone();
    assert_eq!(seen.phase, SessionPhase::Authenticated);
    assert!(seen.is_authenticated());
}

#[tokio::test]
async fn test_logout_signs_out_even_when_api_is_unreachable() {
    // Nothing listens on this port
    let fixture = Fixture::new("http://127.0.0.1:9", "/").with_stored_session("access-1");
    let session = fixture.portal.session();
    session.set_user(portal_core::UserRecord::new(user()));
    assert!(session.is_authenticated());

    let outcome = session.logout().await;

    assert!(outcome.success);
    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
    assert!(fixture.store.access_token().is_none());
    assert!(!fixture.store.has_correlation_tokens());
}

#[tokio::test]
async fn test_failed_login_leaves_session_anonymous() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "These credentials do not match our records.",
            "errors": {"email": ["These credentials do not match our records."]}
        })))
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/login");
    let session = fixture.portal.session();
    let outcome = session.login(&credentials()).await;

    assert!(!outcome.success);
    assert!(outcome.errors.unwrap().contains_key("email"));
    assert_eq!(session.phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_start_loads_config_and_restores_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/config/en"))
        .and(header("IDNC-DOMAIN-ID", "7"))
        .and(header("IDNC-LANGUAGE", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "meta": {"name": "Portal", "maintenance": false}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .and(header("authorization", "Bearer tid-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": user()})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/").with_stored_session("access-1");
    let site = fixture.portal.start().await.unwrap();

    assert_eq!(site.site_name(), "Portal");
    assert!(fixture.portal.session().is_initialized());
    assert!(fixture.portal.session().is_authenticated());
}

#[tokio::test]
async fn test_initialize_without_tokens_makes_no_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": user()})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/");

    assert!(!fixture.portal.session().initialize().await);
    assert_eq!(fixture.portal.session().phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_initialize_refreshes_a_lapsed_access_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer tid-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant("access-2")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": user()})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/").with_correlation_tokens_only();
    let session = fixture.portal.session();

    assert!(session.initialize().await);
    assert!(session.is_authenticated());
    assert_eq!(session.session().access_token.as_deref(), Some("access-2"));
}

#[tokio::test]
async fn test_initialize_clears_session_when_lapsed_token_cannot_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": user()})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/").with_correlation_tokens_only();
    let session = fixture.portal.session();

    assert!(!session.initialize().await);
    assert!(!session.is_authenticated());
    assert!(session.session().access_token.is_none());
    assert_eq!(session.phase(), SessionPhase::Anonymous);
    assert!(!fixture.store.has_correlation_tokens());
}

#[tokio::test]
async fn test_cancelled_initialize_does_not_stay_loading() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"user": user()}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/").with_stored_session("access-1");
    let session = fixture.portal.session();

    let result = tokio::time::timeout(Duration::from_millis(50), session.initialize()).await;

    assert!(result.is_err());
    assert!(!session.is_loading());
    assert_eq!(session.phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_config_is_fetched_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/config/en"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": true, "meta": {"name": "Portal"}}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/");
    let site = fixture.portal.site();
    assert!(!site.is_initialized());

    let first = site.initialize("en").await.unwrap();
    let second = site.initialize("en").await.unwrap();
    let concurrent = join_all((0..5).map(|_| site.initialize("en"))).await;

    assert!(Arc::ptr_eq(&first, &second));
    for config in concurrent {
        assert!(Arc::ptr_eq(&first, &config.unwrap()));
    }
    assert!(site.is_initialized());
    assert_eq!(site.get().unwrap().site_name(), "Portal");
}

#[tokio::test]
async fn test_config_failure_is_fatal_and_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/config/en"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/config/en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": true})))
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/");

    let err = fixture.portal.start().await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to initialize application"));
    assert!(!fixture.portal.site().is_initialized());
    assert!(!fixture.portal.session().is_initialized());

    assert!(fixture.portal.site().initialize("en").await.is_ok());
}

#[tokio::test]
async fn test_locale_switch_refetches_config() {
    let mock_server = MockServer::start().await;

    for (locale, name) in [("en", "Portal"), ("id", "Portal ID")] {
        Mock::given(method("GET"))
            .and(path(format!("/config/{locale}")))
            .and(header("IDNC-LANGUAGE", locale))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"meta": {"name": name}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let fixture = Fixture::new(&mock_server.uri(), "/");
    assert_eq!(fixture.portal.start().await.unwrap().site_name(), "Portal");

    fixture.portal.set_locale("id");
    assert!(fixture.portal.site().get().is_none());
    assert_eq!(fixture.portal.start().await.unwrap().site_name(), "Portal ID");
}

#[tokio::test]
async fn test_interceptor_refresh_updates_session_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wallet"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": "7.00"})))
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wallet"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(10)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant("fresh-token")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/wallet").with_stored_session("stale-token");
    let session = fixture.portal.session();
    session.set_user(portal_core::UserRecord::new(user()));

    let client = fixture.portal.client();
    let wallet: Value = client
        .execute(client.request(Method::GET, "wallet"))
        .await
        .unwrap();

    assert_eq!(wallet["balance"], "7.00");
    assert_eq!(session.session().access_token.as_deref(), Some("fresh-token"));
    assert_eq!(fixture.store.read(ACCESS_TOKEN).as_deref(), Some("fresh-token"));
    assert_eq!(session.phase(), SessionPhase::Authenticated);
}

#[tokio::test]
async fn test_failed_refresh_redirects_to_login_with_return_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard/summary"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/dashboard").with_stored_session("stale-token");
    let session = fixture.portal.session();
    session.set_user(portal_core::UserRecord::new(user()));

    let client = fixture.portal.client();
    let err = client
        .execute::<Value>(client.request(Method::GET, "dashboard/summary"))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!session.is_authenticated());
    assert!(!fixture.store.has_correlation_tokens());
    assert_eq!(fixture.navigator.location(), "/login?redirect=/dashboard");
}

#[tokio::test]
async fn test_failed_refresh_on_home_page_stays_put() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/promotions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fixture = Fixture::new(&mock_server.uri(), "/").with_stored_session("stale-token");

    let client = fixture.portal.client();
    let result = client
        .execute::<Value>(client.request(Method::GET, "promotions"))
        .await;

    assert!(result.is_err());
    assert_eq!(fixture.navigator.history(), vec!["/"]);
}

#[tokio::test]
async fn test_navigation_is_guarded() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new(&mock_server.uri(), "/").with_stored_session("access-1");

    assert_eq!(
        fixture.portal.navigate("/deposit"),
        GuardDecision::Redirect("/login?redirect=/deposit".to_string())
    );
    assert_eq!(fixture.navigator.current_path(), "/login");

    fixture
        .portal
        .session()
        .set_user(portal_core::UserRecord::new(user()));

    assert_eq!(
        fixture.portal.navigate("/register"),
        GuardDecision::Redirect("/".to_string())
    );
    assert_eq!(fixture.portal.navigate("/deposit"), GuardDecision::Allow);
    assert_eq!(fixture.navigator.current_path(), "/deposit");
}
