//! Portal HTTP module: the shared outbound client and the edge auth server
//!
//! The `client` feature provides the single HTTP client the rest of the
//! portal talks through, with its ordered middleware chain, the auth
//! interceptor and the token store. The `server` feature adds the edge
//! routes that keep the identity API's tokens inside an encrypted cookie.

#[cfg(feature = "server")]
#[macro_use]
extern crate tracing;

pub mod error;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod middleware;
#[cfg(feature = "server")]
pub mod routes;
#[cfg(feature = "server")]
pub mod services;
#[cfg(feature = "server")]
pub mod state;

pub use error::{HttpError, Result};

#[cfg(feature = "server")]
pub use state::AppState;

// Re-export commonly used types
#[cfg(feature = "server")]
pub use axum::{Json, extract, response};
