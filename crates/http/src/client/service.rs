//! Auth backend service: the boundary past which no identity API failure
//! escapes as an error.
//!
//! Every operation returns an [`AuthOutcome`]. Credentials land in the
//! [`TokenStore`] only when a grant is complete.

use super::token_store::{SESSION_ID, StoredTokens, TOKEN_ID, TokenStore, TtlPolicy};
use super::{ClientError, PortalClient};
use portal_core::redact::{redact_body, redact_json};
use portal_core::{AuthOutcome, LoginPayload, RegistrationPayload, TokenGrant, UserRecord};
use serde_json::Value;
use std::sync::Arc;

pub struct AuthService {
    client: PortalClient,
    store: Arc<dyn TokenStore>,
    ttl: TtlPolicy,
}

impl AuthService {
    /// `client` must not carry the auth interceptor; refresh runs beneath it.
    pub fn new(client: PortalClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            client,
            store,
            ttl: TtlPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn ttl(&self) -> &TtlPolicy {
        &self.ttl
    }

    pub async fn login(&self, credentials: &LoginPayload) -> AuthOutcome<UserRecord> {
        let grant = match self.client.login(credentials).await {
            Ok(grant) => grant,
            Err(err) => return failure("login", &err, "Login failed"),
        };

        let tokens = StoredTokens::from_grant(&grant);
        if !tokens.is_complete() {
            log_incomplete_grant("login", &grant, &tokens);
            return AuthOutcome::failed("Login failed: incomplete credentials");
        }

        self.store.persist(&tokens, &self.ttl);
        tracing::info!(username = grant.user.as_ref().map(UserRecord::username), "Login successful");
        AuthOutcome::ok("Login successful", grant.user)
    }

    pub async fn register(&self, payload: &RegistrationPayload) -> AuthOutcome<Value> {
        match self.client.register(payload).await {
            Ok(response) => AuthOutcome::ok(
                response
                    .message
                    .unwrap_or_else(|| "Registration successful".to_string()),
                response.data,
            ),
            Err(err) => failure("register", &err, "Registration failed"),
        }
    }

    /// Always succeeds locally; the store is cleared whatever the remote says
    pub async fn logout(&self) -> AuthOutcome<()> {
        let token_id = self.store.read(TOKEN_ID);
        let remote = self.client.logout(token_id.as_deref()).await;
        self.store.clear_all();

        match remote {
            Ok(_) => AuthOutcome::ok("Logged out successfully", None),
            Err(err) => {
                log_failure("logout", &err);
                AuthOutcome::ok("Logged out", None)
            }
        }
    }

    /// Mint a new access token from the stored `token_id`
    pub async fn refresh(&self) -> AuthOutcome<UserRecord> {
        let Some(token_id) = self.store.read(TOKEN_ID) else {
            return AuthOutcome::failed("No active session");
        };

        let grant = match self.client.refresh(Some(&token_id)).await {
            Ok(grant) => grant,
            Err(err) => return failure("refresh", &err, "Token refresh failed"),
        };

        let mut tokens = StoredTokens::from_grant(&grant);
        tokens.token_id = tokens.token_id.or(Some(token_id));
        tokens.session_id = tokens.session_id.or_else(|| self.store.read(SESSION_ID));
        if !tokens.is_complete() {
            log_incomplete_grant("refresh", &grant, &tokens);
            return AuthOutcome::failed("Token refresh failed");
        }

        self.store.persist(&tokens, &self.ttl);
        tracing::debug!("Token refreshed");
        AuthOutcome::ok("Token refreshed", grant.user)
    }

    /// Look up the identity behind the stored correlation tokens
    pub async fn current_user(&self) -> AuthOutcome<UserRecord> {
        let token_id = match self.store.read(TOKEN_ID) {
            Some(token_id) if self.store.has_correlation_tokens() => token_id,
            _ => return AuthOutcome::failed("Not authenticated"),
        };

        match self.client.current_user(&token_id).await {
            Ok(user) => AuthOutcome::ok("User fetched", Some(user)),
            Err(err) => {
                self.store.clear_all();
                failure("current_user", &err, "Failed to fetch user")
            }
        }
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("client", &self.client)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn failure<T>(operation: &str, err: &ClientError, fallback: &str) -> AuthOutcome<T> {
    log_failure(operation, err);
    AuthOutcome::failed_with_errors(
        err.user_message().unwrap_or_else(|| fallback.to_string()),
        err.validation_errors().cloned(),
    )
}

fn log_failure(operation: &str, err: &ClientError) {
    match err.status() {
        Some(status) => {
            let body = failure_body(err);
            tracing::warn!(operation, status, %body, "Identity API call failed");
        }
        None => tracing::warn!(operation, error = %err, "Identity API call failed"),
    }
}

// Status errors may carry the raw response body
fn failure_body(err: &ClientError) -> String {
    err.user_message()
        .map(|message| redact_body(&message))
        .unwrap_or_default()
}

fn log_incomplete_grant(operation: &str, grant: &TokenGrant, tokens: &StoredTokens) {
    let payload = serde_json::to_value(grant).map(|v| redact_json(&v)).unwrap_or_default();
    tracing::error!(
        operation,
        has_access_token = tokens.access_token.is_some(),
        has_token_id = tokens.token_id.is_some(),
        has_session_id = tokens.session_id.is_some(),
        %payload,
        "Identity API returned an incomplete grant"
    );
}
