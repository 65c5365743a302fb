//! Per-navigation route guard

use crate::config::PortalConfig;
use url::form_urlencoded;

/// Outcome of checking one navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Stateless check of a target path against the session state
#[derive(Debug, Clone)]
pub struct RouteGuard {
    protected: Vec<String>,
    auth_only: Vec<String>,
    login_path: String,
    home_path: String,
}

impl RouteGuard {
    pub fn new(
        protected: Vec<String>,
        auth_only: Vec<String>,
        login_path: impl Into<String>,
        home_path: impl Into<String>,
    ) -> Self {
        Self {
            protected,
            auth_only,
            login_path: login_path.into(),
            home_path: home_path.into(),
        }
    }

    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(
            config.protected_paths.clone(),
            config.auth_only_paths.clone(),
            config.login_path.clone(),
            config.home_path.clone(),
        )
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    pub fn evaluate(&self, path: &str, authenticated: bool) -> GuardDecision {
        let target = strip_query(path);

        if !authenticated && matches_any(&self.protected, target) {
            return GuardDecision::Redirect(self.login_redirect(path));
        }
        if authenticated && matches_any(&self.auth_only, target) {
            return GuardDecision::Redirect(self.home_path.clone());
        }
        GuardDecision::Allow
    }

    /// Login location that returns to `path` afterwards
    pub fn login_redirect(&self, path: &str) -> String {
        // Slashes stay readable; every other reserved byte is escaped
        let encoded: String = form_urlencoded::byte_serialize(path.as_bytes()).collect();
        format!("{}?redirect={}", self.login_path, encoded.replace("%2F", "/"))
    }

    /// Whether a session-loss redirect from `path` would bounce the user in place
    pub fn is_entry_path(&self, path: &str) -> bool {
        let target = strip_query(path);
        target == self.login_path || target == self.home_path
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn matches_any(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> RouteGuard {
        RouteGuard::new(
            vec!["/dashboard".into(), "/profile/".into()],
            vec!["/login".into(), "/register".into()],
            "/login",
            "/",
        )
    }

    #[test]
    fn test_protected_path_redirects_anonymous_user() {
        assert_eq!(
            guard().evaluate("/dashboard", false),
            GuardDecision::Redirect("/login?redirect=/dashboard".into())
        );
        assert_eq!(
            guard().evaluate("/profile/settings", false),
            GuardDecision::Redirect("/login?redirect=/profile/settings".into())
        );
        assert_eq!(guard().evaluate("/dashboard", true), GuardDecision::Allow);
    }

    #[test]
    fn test_prefix_match_respects_segment_boundary() {
        assert_eq!(guard().evaluate("/dashboards", false), GuardDecision::Allow);
        assert_eq!(guard().evaluate("/", false), GuardDecision::Allow);
    }

    #[test]
    fn test_auth_only_path_redirects_signed_in_user_home() {
        assert_eq!(
            guard().evaluate("/register", true),
            GuardDecision::Redirect("/".into())
        );
        assert_eq!(guard().evaluate("/register", false), GuardDecision::Allow);
    }

    #[test]
    fn test_login_redirect_escapes_query_characters() {
        assert_eq!(
            guard().login_redirect("/dashboard?tab=bets&page=2"),
            "/login?redirect=/dashboard%3Ftab%3Dbets%26page%3D2"
        );
        assert_eq!(
            guard().evaluate("/dashboard?tab=bets", false),
            GuardDecision::Redirect("/login?redirect=/dashboard%3Ftab%3Dbets".into())
        );
    }

    #[test]
    fn test_entry_paths() {
        assert!(guard().is_entry_path("/login"));
        assert!(guard().is_entry_path("/login?redirect=/x"));
        assert!(guard().is_entry_path("/"));
        assert!(!guard().is_entry_path("/dashboard"));
    }
}
