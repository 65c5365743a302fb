//! Tracing setup shared by the edge daemon and native frontends

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::init_tracing;
