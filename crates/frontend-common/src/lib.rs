//! Frontend session layer for the portal
//!
//! One [`Portal`] per runtime wires the shared HTTP client, the session
//! synchronizer, the route guard and the site configuration cache.

pub mod auth;
pub mod client;
pub mod config;
pub mod navigation;
pub mod services;

pub use auth::context::{Session, SessionPhase, SessionSnapshot, SessionSynchronizer};
pub use auth::guard::{GuardDecision, RouteGuard};
pub use client::Portal;
pub use config::PortalConfig;
pub use navigation::{MemoryNavigator, Navigator};
pub use services::config::{ConfigCache, ConfigInitError};
