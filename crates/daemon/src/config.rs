//! Daemon settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML/YAML file, then `PORTAL__SECTION__KEY` environment variables.

use crate::error::{DaemonError, Result};
use portal_http::client::{CookiePolicy, SameSite, TtlPolicy};
use portal_http::middleware::CsrfConfig;
use portal_http::services::SessionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub session: SessionSettings,
    pub csrf: CsrfSettings,
}

/// Listen address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Identity API the edge forwards to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_base_url: String,
    pub domain_id: String,
    pub locale: String,
    pub timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            domain_id: "1".to_string(),
            locale: "en".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Encrypted session cookie
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Required; the cookie key is derived from it
    pub secret: Option<String>,
    pub cookie_name: String,
    pub same_site: SameSite,
    pub secure: bool,
    /// Access token lifetime when the identity API omits `expires_in`
    pub access_token_ttl_days: i64,
    /// Lifetime of the cookie and the `token_id` it carries
    pub correlation_ttl_days: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: None,
            cookie_name: "portal_session".to_string(),
            same_site: SameSite::Strict,
            secure: true,
            access_token_ttl_days: 7,
            correlation_ttl_days: 30,
        }
    }
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("cookie_name", &self.cookie_name)
            .field("same_site", &self.same_site)
            .field("secure", &self.secure)
            .field("access_token_ttl_days", &self.access_token_ttl_days)
            .field("correlation_ttl_days", &self.correlation_ttl_days)
            .finish()
    }
}

/// Origins allowed to send state-changing requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfSettings {
    pub domain_url: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl Settings {
    /// Load settings, reading `path` when given
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value has the wrong type
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(std::path::Path::new(path)));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PORTAL")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("csrf.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load settings from a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &str) -> Result<Self> {
        Self::load(Some(path))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            same_site: self.session.same_site,
            secure: self.session.secure,
            ..CookiePolicy::default()
        }
    }

    /// # Errors
    ///
    /// Returns an error if a lifetime is not a positive number of days
    pub fn ttl_policy(&self) -> Result<TtlPolicy> {
        let days = |name: &str, value: i64| {
            chrono::Duration::try_days(value)
                .filter(|_| value > 0)
                .ok_or_else(|| DaemonError::InvalidConfig(format!("session.{name} must be positive")))
        };

        Ok(TtlPolicy {
            access_token_default: days("access_token_ttl_days", self.session.access_token_ttl_days)?,
            correlation: days("correlation_ttl_days", self.session.correlation_ttl_days)?,
        })
    }

    /// # Errors
    ///
    /// Returns an error if no session secret is configured or a lifetime is invalid
    pub fn session_config(&self) -> Result<SessionConfig> {
        let secret = self
            .session
            .secret
            .clone()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| {
                DaemonError::InvalidConfig(
                    "session.secret is required (PORTAL__SESSION__SECRET)".to_string(),
                )
            })?;

        Ok(SessionConfig {
            secret,
            cookie_name: self.session.cookie_name.clone(),
            policy: self.cookie_policy(),
            ttl: self.ttl_policy()?,
        })
    }

    pub fn csrf_config(&self) -> CsrfConfig {
        CsrfConfig {
            domain_url: self.csrf.domain_url.clone(),
            allowed_origins: self.csrf.allowed_origins.clone(),
        }
    }
}
