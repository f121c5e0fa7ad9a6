//! Twitch app access token manager.
//!
//! Uses the OAuth client-credentials grant
//! (`POST https://id.twitch.tv/oauth2/token`). Twitch reports an `expires_in`
//! but tokens can be revoked early, so validity is discovered reactively from
//! Helix `401` responses rather than tracked here.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::credentials::error::AuthError;
use crate::credentials::manager::CredentialManager;
use crate::credentials::types::Credential;

/// Production token endpoint.
pub const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Twitch client-credentials manager.
pub struct TwitchCredentialManager {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    held: RwLock<Option<Arc<Credential>>>,
}

impl TwitchCredentialManager {
    pub fn new(client: Client, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_token_url(client, TWITCH_TOKEN_URL, client_id, client_secret)
    }

    /// Create a manager against a custom token endpoint (used by tests).
    pub fn with_token_url(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            held: RwLock::new(None),
        }
    }
}

#[async_trait]
impl CredentialManager for TwitchCredentialManager {
    fn platform_id(&self) -> &'static str {
        "twitch"
    }

    #[instrument(skip(self))]
    async fn acquire(&self) -> Result<Arc<Credential>, AuthError> {
        debug!("Requesting Twitch app access token");

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Twitch token exchange rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(AuthError::Decode(
                "token response carried an empty access_token".to_string(),
            ));
        }

        let credential = Arc::new(Credential::new(token.access_token));
        *self.held.write() = Some(Arc::clone(&credential));

        info!(
            expires_in_secs = ?token.expires_in,
            token_type = ?token.token_type,
            "Twitch app access token acquired"
        );
        Ok(credential)
    }

    fn current(&self) -> Option<Arc<Credential>> {
        self.held.read().clone()
    }
}
