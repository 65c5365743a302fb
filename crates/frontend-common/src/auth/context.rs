//! Reactive session state
//!
//! [`SessionSynchronizer`] is the only owner of the [`Session`]. Readers
//! subscribe to a `watch` channel; every change is one locked assignment, so
//! no reader ever sees a half-updated session.

use crate::auth::guard::RouteGuard;
use crate::navigation::Navigator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_core::{AuthOutcome, LoginPayload, RegistrationPayload, UserRecord};
use portal_http::client::token_store::ACCESS_TOKEN;
use portal_http::client::{AuthService, SessionHooks};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The signed-in identity and the credential backing it
#[derive(Clone, PartialEq)]
pub struct Session {
    pub user: Option<UserRecord>,
    pub access_token: Option<String>,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    // The user and the access token are only ever set together
    fn signed_in(user: UserRecord, access_token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            user: Some(user),
            access_token: Some(access_token),
            expires_at,
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: None,
            access_token: None,
            token_type: "Bearer".to_string(),
            expires_at: None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

/// What subscribers observe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub session: Session,
    pub phase: SessionPhase,
    // Operations still holding a loading guard
    pending: usize,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Loading
    }

    fn settle(&mut self) {
        if self.pending == 0 {
            self.phase = if self.session.is_authenticated() {
                SessionPhase::Authenticated
            } else {
                SessionPhase::Anonymous
            };
        }
    }
}

/// Holds the session in `Loading` until dropped, on every exit path
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
}

impl<'a> LoadingGuard<'a> {
    fn enter(state: &'a watch::Sender<SessionSnapshot>) -> Self {
        state.send_modify(|snapshot| {
            snapshot.pending += 1;
            snapshot.phase = SessionPhase::Loading;
        });
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|snapshot| {
            snapshot.pending = snapshot.pending.saturating_sub(1);
            snapshot.settle();
        });
    }
}

/// Keeps the in-memory session in step with the token store and the
/// identity API.
pub struct SessionSynchronizer {
    service: AuthService,
    navigator: Arc<dyn Navigator>,
    guard: RouteGuard,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionSynchronizer {
    pub fn new(service: AuthService, navigator: Arc<dyn Navigator>, guard: RouteGuard) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            service,
            navigator,
            guard,
            state,
        }
    }

    pub fn service(&self) -> &AuthService {
        &self.service
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.state.borrow().session.user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn is_initialized(&self) -> bool {
        self.phase() != SessionPhase::Uninitialized
    }

    /// Restore the session from stored correlation tokens.
    ///
    /// A lapsed access token is refreshed before the identity is looked up.
    /// Returns whether a user was adopted.
    pub async fn initialize(&self) -> bool {
        let _loading = LoadingGuard::enter(&self.state);
        let store = self.service.store();

        if !store.has_correlation_tokens() {
            debug!("No stored session");
            store.clear_all();
            self.clear_user();
            return false;
        }

        if store.access_token().is_none() {
            let refreshed = self.service.refresh().await;
            if !refreshed.success {
                warn!(message = %refreshed.message, "Stored session could not be refreshed");
                store.clear_all();
                self.clear_user();
                return false;
            }
        }

        let outcome = self.service.current_user().await;
        match outcome.data {
            Some(user) if outcome.success => {
                let username = user.username().to_string();
                let adopted = self.set_user(user);
                if adopted {
                    info!(%username, "Session restored");
                }
                adopted
            }
            _ => {
                warn!(message = %outcome.message, "Stored session rejected");
                self.clear_user();
                false
            }
        }
    }

    pub async fn login(&self, credentials: &LoginPayload) -> AuthOutcome<UserRecord> {
        let _loading = LoadingGuard::enter(&self.state);

        let outcome = self.service.login(credentials).await;
        if let Some(user) = outcome.data.as_ref().filter(|_| outcome.success) {
            self.set_user(user.clone());
        }
        outcome
    }

    /// Registration does not sign the user in
    pub async fn register(&self, payload: &RegistrationPayload) -> AuthOutcome<Value> {
        let _loading = LoadingGuard::enter(&self.state);
        self.service.register(payload).await
    }

    pub async fn logout(&self) -> AuthOutcome<()> {
        let _loading = LoadingGuard::enter(&self.state);

        let outcome = self.service.logout().await;
        self.clear_user();
        outcome
    }

    /// Mint a new access token and mirror it into the session
    pub async fn refresh(&self) -> bool {
        let _loading = LoadingGuard::enter(&self.state);

        let outcome = self.service.refresh().await;
        if !outcome.success {
            debug!(message = %outcome.message, "Refresh rejected");
            return false;
        }

        match outcome.data.or_else(|| self.current_user()) {
            Some(user) => self.set_user(user),
            None => true,
        }
    }

    /// Adopt `user`, paired with the live access token in the store.
    ///
    /// Without one the session is cleared instead and `false` returned.
    pub fn set_user(&self, user: UserRecord) -> bool {
        let store = self.service.store();
        let Some(access_token) = store.access_token() else {
            warn!("No live access token; not adopting user");
            self.clear_user();
            return false;
        };

        self.replace(Session::signed_in(
            user,
            access_token,
            store.expires_at(ACCESS_TOKEN),
        ));
        true
    }

    pub fn clear_user(&self) {
        self.replace(Session::default());
    }

    /// Apply a real-time balance update; ignored while signed out
    pub fn update_balance(&self, balance: impl Into<String>) {
        let balance = balance.into();
        self.state.send_if_modified(|snapshot| match &snapshot.session.user {
            Some(user) => {
                snapshot.session.user = Some(user.with_balance(balance));
                true
            }
            None => false,
        });
    }

    fn replace(&self, session: Session) {
        self.state.send_modify(|snapshot| {
            snapshot.session = session;
            snapshot.settle();
        });
    }
}

#[async_trait]
impl SessionHooks for SessionSynchronizer {
    fn access_token(&self) -> Option<String> {
        self.service.store().access_token()
    }

    async fn refresh(&self) -> bool {
        SessionSynchronizer::refresh(self).await
    }

    async fn on_refresh_failed(&self) {
        self.service.store().clear_all();
        self.clear_user();

        let path = self.navigator.current_path();
        if self.guard.is_entry_path(&path) {
            debug!(%path, "Session ended on an entry page");
            return;
        }

        warn!(from = %path, "Session expired, redirecting to login");
        self.navigator.navigate(&self.guard.login_redirect(&path));
    }
}

impl fmt::Debug for SessionSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSynchronizer")
            .field("state", &*self.state.borrow())
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use portal_core::{Clock, ManualClock};
    use portal_http::client::{CookieTokenStore, PortalClient, StoredTokens, TokenStore, TtlPolicy};
    use serde_json::json;

    mock! {
        pub Nav {}

        impl Navigator for Nav {
            fn current_path(&self) -> String;
            fn navigate(&self, to: &str);
        }
    }

    fn synchronizer(navigator: MockNav) -> SessionSynchronizer {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let store = Arc::new(CookieTokenStore::new(clock));
        store.persist(
            &StoredTokens {
                access_token: Some("access-1".into()),
                expires_in: Some(3600),
                token_id: Some("tid-1".into()),
                session_id: Some("sid-1".into()),
            },
            &TtlPolicy::default(),
        );
        let client = PortalClient::new("http://127.0.0.1:9").unwrap();
        SessionSynchronizer::new(
            AuthService::new(client, store),
            Arc::new(navigator),
            RouteGuard::default(),
        )
    }

    fn player() -> UserRecord {
        UserRecord::new(json!({"username": "player1", "balance": "10.00"}))
    }

    #[test]
    fn test_set_user_pairs_user_with_stored_token() {
        let sync = synchronizer(MockNav::new());
        assert_eq!(sync.phase(), SessionPhase::Uninitialized);

        sync.set_user(player());

        let session = sync.session();
        assert_eq!(sync.phase(), SessionPhase::Authenticated);
        assert_eq!(session.access_token.as_deref(), Some("access-1"));
        assert!(session.expires_at.is_some());

        sync.clear_user();
        assert_eq!(sync.session(), Session::default());
        assert_eq!(sync.phase(), SessionPhase::Anonymous);
    }

    #[test]
    fn test_user_is_never_adopted_without_access_token() {
        let sync = synchronizer(MockNav::new());
        sync.set_user(player());
        sync.service().store().clear(&[ACCESS_TOKEN]);

        assert!(!sync.set_user(player()));
        assert_eq!(sync.session(), Session::default());
        assert!(!sync.is_authenticated());
        assert_eq!(sync.phase(), SessionPhase::Anonymous);
    }

    #[test]
    fn test_loading_resolves_after_last_guard() {
        let sync = synchronizer(MockNav::new());

        let outer = LoadingGuard::enter(&sync.state);
        let inner = LoadingGuard::enter(&sync.state);
        sync.set_user(player());
        assert!(sync.is_loading());

        drop(inner);
        assert!(sync.is_loading());
        drop(outer);
        assert_eq!(sync.phase(), SessionPhase::Authenticated);
    }

    #[test]
    fn test_update_balance_only_when_signed_in() {
        let sync = synchronizer(MockNav::new());
        let mut updates = sync.subscribe();

        sync.update_balance("5.00");
        assert!(!updates.has_changed().unwrap());

        sync.set_user(player());
        updates.borrow_and_update();
        sync.update_balance("25.50");

        assert!(updates.has_changed().unwrap());
        assert_eq!(sync.current_user().unwrap().balance(), "25.50");
    }

    #[tokio::test]
    async fn test_refresh_failure_redirects_with_return_path() {
        let mut navigator = MockNav::new();
        navigator
            .expect_current_path()
            .return_const("/dashboard".to_string());
        navigator
            .expect_navigate()
            .withf(|to: &str| to == "/login?redirect=/dashboard")
            .times(1)
            .return_const(());

        let sync = synchronizer(navigator);
        sync.set_user(player());
        SessionHooks::on_refresh_failed(&sync).await;

        assert!(!sync.is_authenticated());
        assert!(!sync.service().store().has_correlation_tokens());
        assert!(SessionHooks::access_token(&sync).is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_on_entry_pages_does_not_navigate() {
        for path in ["/login", "/"] {
            let mut navigator = MockNav::new();
            navigator
                .expect_current_path()
                .return_const(path.to_string());
            navigator.expect_navigate().never();

            let sync = synchronizer(navigator);
            sync.set_user(player());
            SessionHooks::on_refresh_failed(&sync).await;

            assert_eq!(sync.phase(), SessionPhase::Anonymous);
        }
    }

    #[tokio::test]
    async fn test_operations_resolve_loading_when_api_is_unreachable() {
        let sync = synchronizer(MockNav::new());

        assert!(!sync.initialize().await);
        assert_eq!(sync.phase(), SessionPhase::Anonymous);

        let outcome = sync
            .login(&LoginPayload {
                email: "player1@example.com".into(),
                password: "hunter22".into(),
            })
            .await;
        assert!(!outcome.success);
        assert!(!sync.is_loading());

        assert!(!sync.refresh().await);
        assert!(sync.logout().await.success);
        assert_eq!(sync.phase(), SessionPhase::Anonymous);
    }
}
