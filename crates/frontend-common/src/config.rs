//! Frontend configuration

use portal_http::client::context::DEFAULT_MOBILE_BREAKPOINT;
use portal_http::client::token_store::TtlPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Settings one portal frontend runs with
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Identity and content API root
    pub api_base_url: String,
    pub domain_id: String,
    pub default_locale: String,
    /// Viewports narrower than this count as mobile
    pub mobile_breakpoint: u32,
    /// Paths that need a session; a prefix also covers its sub-paths
    pub protected_paths: Vec<String>,
    /// Paths a signed-in user is sent away from
    pub auth_only_paths: Vec<String>,
    pub login_path: String,
    pub home_path: String,
    pub timeout_seconds: u64,
    #[serde(skip)]
    pub ttl: TtlPolicy,
}

impl PortalConfig {
    pub const DEFAULT_LOGIN_PATH: &'static str = "/login";
    pub const DEFAULT_HOME_PATH: &'static str = "/";
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

    pub fn new(api_base_url: impl Into<String>, domain_id: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            domain_id: domain_id.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            domain_id: "1".to_string(),
            default_locale: "en".to_string(),
            mobile_breakpoint: DEFAULT_MOBILE_BREAKPOINT,
            protected_paths: vec![
                "/profile".to_string(),
                "/dashboard".to_string(),
                "/deposit".to_string(),
                "/withdraw".to_string(),
                "/history".to_string(),
            ],
            auth_only_paths: vec!["/login".to_string(), "/register".to_string()],
            login_path: Self::DEFAULT_LOGIN_PATH.to_string(),
            home_path: Self::DEFAULT_HOME_PATH.to_string(),
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
            ttl: TtlPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: PortalConfig = serde_json::from_str(
            r#"{"api_base_url": "https://api.example.com", "protected_paths": ["/vip"]}"#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.protected_paths, vec!["/vip"]);
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.mobile_breakpoint, 1024);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }
}
