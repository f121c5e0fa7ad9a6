//! Credential manager trait.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AuthError, Credential};

/// Acquires and holds the bearer credential for one platform.
///
/// Implementations keep at most one credential and swap it atomically on a
/// successful [`acquire`](CredentialManager::acquire). A failed acquisition
/// leaves the previously held credential in place.
#[async_trait]
pub trait CredentialManager: Send + Sync {
    /// Platform identifier (e.g., "twitch").
    fn platform_id(&self) -> &'static str;

    /// Exchange the client identity for a new credential and hold it.
    async fn acquire(&self) -> Result<Arc<Credential>, AuthError>;

    /// The credential currently held, if any.
    fn current(&self) -> Option<Arc<Credential>>;

    /// Optimistic local check: true once a credential has been acquired.
    ///
    /// The upstream API remains the source of truth; a held credential can
    /// still be rejected.
    fn is_valid(&self) -> bool {
        self.current().is_some()
    }
}
