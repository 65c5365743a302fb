//! Encrypted server-side session carried in a single HttpOnly cookie

use crate::client::token_store::{CookiePolicy, SameSite, TtlPolicy};
use crate::error::HttpError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use axum_extra::extract::cookie::{self, Cookie, CookieJar};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use portal_core::{TokenGrant, UserRecord};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const NONCE_SIZE: usize = 12;

/// Identity API credentials held for one browser
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub user: UserRecord,
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

impl ServerSession {
    /// Build from a grant; `None` unless it carries an access token and a user
    pub fn from_grant(grant: TokenGrant, ttl: &TtlPolicy, now: DateTime<Utc>) -> Option<Self> {
        let access_token = grant.access_token()?.to_string();
        let token_type = grant.token_type().to_string();
        let expires_at = ttl.access_token_expiry(now, grant.expires_in);

        Some(Self {
            user: grant.user?,
            access_token,
            token_type,
            expires_in: grant.expires_in,
            expires_at,
        })
    }

    pub fn token_id(&self) -> Option<&str> {
        self.user.token_id()
    }

    /// Whether the access token has lapsed; the `token_id` may still refresh it
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSession")
            .field("user", &self.user)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Session cookie settings
///
/// The cookie carries the `token_id`, so it lives as long as the
/// correlation tokens do.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub policy: CookiePolicy,
    pub ttl: TtlPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: "portal_session".to_string(),
            policy: CookiePolicy::default(),
            ttl: TtlPolicy::default(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("policy", &self.policy)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Seals sessions with AES-256-GCM and moves them in and out of the cookie jar
pub struct SessionStore {
    cipher: Aes256Gcm,
    config: SessionConfig,
}

impl SessionStore {
    /// The key is the SHA-256 digest of the configured secret
    pub fn new(config: SessionConfig) -> Result<Self, HttpError> {
        if config.secret.is_empty() {
            return Err(HttpError::InternalServerError(
                "session secret must not be empty".into(),
            ));
        }
        let key = Sha256::digest(config.secret.as_bytes());
        let cipher = Aes256Gcm::new(&key);

        Ok(Self { cipher, config })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ttl(&self) -> &TtlPolicy {
        &self.config.ttl
    }

    /// Encrypt into `base64url(nonce || ciphertext)`
    pub fn seal(&self, session: &ServerSession) -> Result<String, HttpError> {
        let plaintext = serde_json::to_vec(session)
            .map_err(|e| HttpError::InternalServerError(format!("session encode: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| HttpError::InternalServerError("session encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Decrypt a sealed session. Tampered or foreign values read as absent.
    pub fn open(&self, sealed: &str) -> Option<ServerSession> {
        let bytes = URL_SAFE_NO_PAD.decode(sealed).ok()?;
        if bytes.len() <= NONCE_SIZE {
            return None;
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;

        serde_json::from_slice(&plaintext).ok()
    }

    pub fn load(&self, jar: &CookieJar) -> Option<ServerSession> {
        let cookie = jar.get(&self.config.cookie_name)?;
        let session = self.open(cookie.value());
        if session.is_none() {
            debug!("Discarding unreadable session cookie");
        }
        session
    }

    pub fn save(&self, jar: CookieJar, session: &ServerSession) -> Result<CookieJar, HttpError> {
        let sealed = self.seal(session)?;
        let max_age = time::Duration::seconds(self.config.ttl.correlation.num_seconds());
        Ok(jar.add(self.cookie(sealed, max_age)))
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.cookie(String::new(), time::Duration::ZERO))
    }

    fn cookie(&self, value: String, max_age: time::Duration) -> Cookie<'static> {
        let policy = &self.config.policy;
        let same_site = match policy.same_site {
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::None => cookie::SameSite::None,
        };

        Cookie::build((self.config.cookie_name.clone(), value))
            .path(policy.path.clone())
            .http_only(true)
            .same_site(same_site)
            .secure(policy.secure || policy.same_site == SameSite::None)
            .max_age(max_age)
            .build()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn store() -> SessionStore {
        SessionStore::new(SessionConfig {
            secret: "test-secret".into(),
            ..SessionConfig::default()
        })
        .unwrap()
    }

    fn session() -> ServerSession {
        let grant = TokenGrant {
            access_token: Some("access-1".into()),
            token_type: Some("Bearer".into()),
            expires_in: Some(3600),
            user: Some(UserRecord::new(json!({"username": "ana", "token_id": "tid"}))),
        };
        ServerSession::from_grant(grant, &TtlPolicy::default(), Utc::now()).unwrap()
    }

    #[test]
    fn test_seal_then_open() {
        let store = store();
        let sealed = store.seal(&session()).unwrap();

        assert!(!sealed.contains("access-1"));
        let opened = store.open(&sealed).unwrap();
        assert_eq!(opened.access_token, "access-1");
        assert_eq!(opened.token_id(), Some("tid"));
    }

    #[test]
    fn test_tampered_or_foreign_cookie_is_rejected() {
        let store = store();
        let mut sealed = store.seal(&session()).unwrap().into_bytes();
        let last = sealed.len() - 1;
        sealed[last] = if sealed[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(sealed).unwrap();

        assert!(store.open(&tampered).is_none());
        assert!(store.open("not-base64!").is_none());

        let other = SessionStore::new(SessionConfig {
            secret: "other".into(),
            ..SessionConfig::default()
        })
        .unwrap();
        assert!(other.open(&store.seal(&session()).unwrap()).is_none());
    }

    #[test]
    fn test_grant_without_user_is_not_a_session() {
        let grant = TokenGrant {
            access_token: Some("a".into()),
            ..TokenGrant::default()
        };
        assert!(ServerSession::from_grant(grant, &TtlPolicy::default(), Utc::now()).is_none());
    }

    #[test]
    fn test_cookie_attributes_follow_policy() {
        let store = store();
        let jar = store.save(CookieJar::new(), &session()).unwrap();
        let cookie = jar.get("portal_session").unwrap();

        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(cookie::SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert!(store.load(&jar).is_some());
    }

    #[test]
    fn test_cookie_outlives_the_access_token() {
        let store = store();
        let jar = store.save(CookieJar::new(), &session()).unwrap();
        let cookie = jar.get("portal_session").unwrap();

        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));
    }

    #[test]
    fn test_out_of_range_expires_in_falls_back_to_default() {
        let now = Utc::now();
        let grant = TokenGrant {
            access_token: Some("a".into()),
            expires_in: Some(i64::MAX),
            user: Some(UserRecord::new(json!({"token_id": "tid"}))),
            ..TokenGrant::default()
        };
        let session = ServerSession::from_grant(grant, &TtlPolicy::default(), now).unwrap();

        assert_eq!(session.expires_at, now + Duration::days(7));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::days(8)));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(SessionStore::new(SessionConfig::default()).is_err());
    }
}
