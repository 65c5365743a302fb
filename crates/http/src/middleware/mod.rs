//! Middleware components for HTTP request processing

pub mod csrf;

pub use csrf::{CsrfConfig, csrf_middleware};
