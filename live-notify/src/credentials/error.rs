//! Credential error types.

use thiserror::Error;

/// Errors that can occur while acquiring an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint answered with a non-success status.
    #[error("Token exchange rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The token response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl AuthError {
    /// Check if the platform refused the client identity itself (bad id or secret).
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
