//! Live status detection seam.
//!
//! The scheduler talks to the upstream platform through [`LiveStatusSource`],
//! which separates credential rejection from every other failure so the
//! caller can refresh and retry only when that can help.

use async_trait::async_trait;
use thiserror::Error;

use super::session::{ChannelName, LiveSession};

/// Errors from a live status query.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream rejected the bearer credential (or none was held).
    #[error("upstream rejected the access token")]
    Unauthorized,

    /// Network failure, unexpected status or undecodable body.
    #[error("transient failure (status: {status:?}): {cause}")]
    Transient { status: Option<u16>, cause: String },
}

impl FetchError {
    pub fn transient(status: Option<u16>, cause: impl Into<String>) -> Self {
        Self::Transient {
            status,
            cause: cause.into(),
        }
    }

    /// Whether refreshing the credential may fix this error.
    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Source of live status snapshots for a fixed channel list.
#[async_trait]
pub trait LiveStatusSource: Send + Sync {
    /// Platform identifier (e.g., "twitch").
    fn platform_id(&self) -> &'static str;

    /// Return the sessions of every channel in `channels` that is live right now.
    ///
    /// Channels that are offline are simply absent from the result.
    async fn fetch_live_statuses(
        &self,
        channels: &[ChannelName],
    ) -> Result<Vec<LiveSession>, FetchError>;
}
