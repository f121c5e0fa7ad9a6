//! Credential management module.
//!
//! - [`Credential`]: an in-memory bearer token, replaced wholesale on refresh
//! - [`CredentialManager`]: acquire/hold trait consulted on every API call
//! - [`TwitchCredentialManager`]: client-credentials grant against Twitch

mod error;
mod manager;
mod types;

// Platform-specific implementations
pub mod platforms;

pub use error::AuthError;
pub use manager::CredentialManager;
pub use platforms::TwitchCredentialManager;
pub use types::Credential;
