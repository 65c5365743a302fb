use portal_http::HttpError;
use portal_http::client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upstream client error: {0}")]
    Client(#[from] ClientError),

    #[error("HTTP server error: {0}")]
    Http(#[from] HttpError),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
