pub mod config;

pub use config::{ConfigCache, ConfigInitError};
