//! Service layer for the edge server

pub mod session;

pub use session::{ServerSession, SessionConfig, SessionStore};
