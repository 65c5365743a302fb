//! Portal edge daemon: serves the auth routes in front of the identity API

pub mod config;
pub mod error;
pub mod server;

pub use config::Settings;
pub use error::{DaemonError, Result};
pub use server::ServerBuilder;
