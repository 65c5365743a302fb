//! Durable backing for the session's credentials
//!
//! Correlation tokens outlive the access token so a refresh can still be
//! attempted after the access token itself has expired.

use chrono::{DateTime, Duration, Utc};
use portal_core::{Clock, SystemClock, TokenGrant};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub const TOKEN_ID: &str = "token_id";
pub const SESSION_ID: &str = "session_id";
pub const ACCESS_TOKEN: &str = "access_token";

/// Every name the store may hold
pub const ALL_TOKENS: [&str; 3] = [ACCESS_TOKEN, TOKEN_ID, SESSION_ID];

/// How long persisted credentials stay valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Used when the server does not declare `expires_in`
    pub access_token_default: Duration,
    pub correlation: Duration,
}

impl TtlPolicy {
    /// Lifetime of an access token given the server-declared `expires_in`.
    /// Values chrono cannot represent fall back to the default.
    pub fn access_token_ttl(&self, expires_in: Option<i64>) -> Duration {
        expires_in
            .filter(|seconds| *seconds > 0)
            .and_then(Duration::try_seconds)
            .unwrap_or(self.access_token_default)
    }

    /// When an access token issued at `now` lapses
    pub fn access_token_expiry(&self, now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
        now.checked_add_signed(self.access_token_ttl(expires_in))
            .unwrap_or_else(|| expiry(now, self.access_token_default))
    }

    /// When correlation tokens written at `now` lapse
    pub fn correlation_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        expiry(now, self.correlation)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            access_token_default: Duration::days(7),
            correlation: Duration::days(30),
        }
    }
}

/// Cookie `SameSite` attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

/// Attributes of the edge session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub same_site: SameSite,
    pub secure: bool,
    pub path: String,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            same_site: SameSite::Strict,
            secure: true,
            path: "/".to_string(),
        }
    }
}

/// Credentials extracted from a login or refresh grant
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_id: Option<String>,
    pub session_id: Option<String>,
}

impl StoredTokens {
    pub fn from_grant(grant: &TokenGrant) -> Self {
        let user = grant.user.as_ref();
        Self {
            access_token: grant.access_token().map(str::to_string),
            expires_in: grant.expires_in,
            token_id: user.and_then(|u| u.token_id()).map(str::to_string),
            session_id: user.and_then(|u| u.session_id()).map(str::to_string),
        }
    }

    /// A usable grant carries an access token and both correlation ids
    pub fn is_complete(&self) -> bool {
        self.access_token.is_some() && self.token_id.is_some() && self.session_id.is_some()
    }
}

impl fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredTokens")
            .field("has_access_token", &self.access_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("has_token_id", &self.token_id.is_some())
            .field("has_session_id", &self.session_id.is_some())
            .finish()
    }
}

/// Persistence for session credentials
pub trait TokenStore: Send + Sync {
    /// Write every present token with its TTL. Absent fields are left as is.
    fn persist(&self, tokens: &StoredTokens, ttl: &TtlPolicy);

    /// Unexpired value for `name`
    fn read(&self, name: &str) -> Option<String>;

    fn clear(&self, names: &[&str]);

    /// Whether a persistence medium exists in this execution context
    fn is_available(&self) -> bool;

    /// When the live value for `name` lapses, if the medium tracks it
    fn expires_at(&self, _name: &str) -> Option<DateTime<Utc>> {
        None
    }

    fn has_correlation_tokens(&self) -> bool {
        self.read(TOKEN_ID).is_some() && self.read(SESSION_ID).is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN)
    }

    fn clear_all(&self) {
        self.clear(&ALL_TOKENS);
    }
}

#[derive(Clone)]
struct CookieEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Cookie-jar token store.
///
/// Entries expire against the injected [`Clock`]. An unavailable store
/// (server rendering) drops writes and reads nothing.
pub struct CookieTokenStore {
    jar: Option<Mutex<HashMap<String, CookieEntry>>>,
    clock: Arc<dyn Clock>,
}

impl CookieTokenStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jar: Some(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Store with no persistence medium
    pub fn unavailable() -> Self {
        Self {
            jar: None,
            clock: Arc::new(SystemClock),
        }
    }

    fn write(&self, name: &str, value: &str, expires_at: DateTime<Utc>) {
        let Some(jar) = &self.jar else {
            return;
        };
        let entry = CookieEntry {
            value: value.to_string(),
            expires_at,
        };
        jar.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), entry);
    }

    fn live_entry(&self, name: &str) -> Option<CookieEntry> {
        let jar = self.jar.as_ref()?;
        let mut jar = jar.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = jar.get(name)?.clone();

        if entry.expires_at <= self.clock.now() {
            jar.remove(name);
            return None;
        }
        Some(entry)
    }
}

impl TokenStore for CookieTokenStore {
    fn persist(&self, tokens: &StoredTokens, ttl: &TtlPolicy) {
        let now = self.clock.now();
        if let Some(access_token) = &tokens.access_token {
            self.write(
                ACCESS_TOKEN,
                access_token,
                ttl.access_token_expiry(now, tokens.expires_in),
            );
        }
        if let Some(token_id) = &tokens.token_id {
            self.write(TOKEN_ID, token_id, ttl.correlation_expiry(now));
        }
        if let Some(session_id) = &tokens.session_id {
            self.write(SESSION_ID, session_id, ttl.correlation_expiry(now));
        }
    }

    fn read(&self, name: &str) -> Option<String> {
        self.live_entry(name).map(|entry| entry.value)
    }

    fn clear(&self, names: &[&str]) {
        let Some(jar) = &self.jar else {
            return;
        };
        let mut jar = jar.lock().unwrap_or_else(PoisonError::into_inner);
        for name in names {
            jar.remove(*name);
        }
    }

    fn is_available(&self) -> bool {
        self.jar.is_some()
    }

    fn expires_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.live_entry(name).map(|entry| entry.expires_at)
    }
}

impl fmt::Debug for CookieTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieTokenStore")
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}
