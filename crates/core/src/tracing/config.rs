//! Configuration for tracing and log output

use serde::{Deserialize, Serialize};

/// Main instrumentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Service name attached to every log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log level filter (e.g., "info", "debug", "portal=trace")
    pub log_level: String,
    /// Emit newline-delimited JSON instead of human-readable lines
    #[serde(default)]
    pub json: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            service_name: "portal".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl InstrumentationConfig {
    /// Create configuration from environment variables
    ///
    /// Supports the following environment variables:
    /// - `SERVICE_NAME`: Service name
    /// - `SERVICE_VERSION`: Service version
    /// - `RUST_LOG`: Log level filter
    /// - `LOG_FORMAT`: `json` switches to structured output
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: std::env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            service_version: std::env::var("SERVICE_VERSION").unwrap_or(defaults.service_version),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            json: std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")),
        }
    }

    /// Create a development configuration with sensible defaults
    pub fn dev() -> Self {
        Self {
            service_name: "portal-dev".to_string(),
            service_version: "dev".to_string(),
            log_level: "debug".to_string(),
            json: false,
        }
    }
}
