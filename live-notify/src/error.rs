//! Application-wide error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop startup.
///
/// Failures inside a poll cycle never reach this type; the scheduler logs them
/// and moves on to the next tick.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
