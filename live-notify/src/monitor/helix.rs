//! Twitch Helix `streams` client.
//!
//! All tracked channels are resolved in a single request
//! (`GET /helix/streams?user_login=a&user_login=b...`), authenticated with the
//! app access token held by the credential manager.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::detector::{FetchError, LiveStatusSource};
use super::session::{ChannelName, LiveSession};
use crate::credentials::CredentialManager;

/// Production Helix API base.
pub const HELIX_API_BASE: &str = "https://api.twitch.tv/helix";

const CLIENT_ID_HEADER: &str = "Client-Id";
const RATELIMIT_REMAINING_HEADER: &str = "Ratelimit-Remaining";
const RATELIMIT_LIMIT_HEADER: &str = "Ratelimit-Limit";

#[derive(Debug, Deserialize)]
struct HelixDataResponse<T> {
    data: Vec<T>,
}

/// Subset of a Helix stream object that we use.
#[derive(Debug, Deserialize)]
struct HelixStream {
    id: String,
    user_login: String,
    user_name: String,
    #[serde(default)]
    game_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnail_url: String,
}

impl From<HelixStream> for LiveSession {
    fn from(stream: HelixStream) -> Self {
        Self {
            channel: ChannelName::new(&stream.user_login),
            session_id: stream.id,
            title: stream.title,
            game_name: stream.game_name,
            thumbnail_url_template: stream.thumbnail_url,
            display_name: stream.user_name,
        }
    }
}

/// Helix live status client.
pub struct HelixClient {
    client: Client,
    api_base: String,
    client_id: String,
    credentials: Arc<dyn CredentialManager>,
}

impl HelixClient {
    /// Create a client against the production Helix API.
    pub fn new(
        client: Client,
        client_id: impl Into<String>,
        credentials: Arc<dyn CredentialManager>,
    ) -> Self {
        Self::with_api_base(client, HELIX_API_BASE, client_id, credentials)
    }

    /// Create a client against a custom API base (used by tests).
    pub fn with_api_base(
        client: Client,
        api_base: impl Into<String>,
        client_id: impl Into<String>,
        credentials: Arc<dyn CredentialManager>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            credentials,
        }
    }

    /// Build the batched `streams` URL for all channels.
    fn streams_url(&self, channels: &[ChannelName]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/streams", self.api_base))
            .map_err(|e| FetchError::transient(None, format!("invalid Helix URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("first", &channels.len().to_string());
            for channel in channels {
                query.append_pair("user_login", channel.as_str());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl LiveStatusSource for HelixClient {
    fn platform_id(&self) -> &'static str {
        "twitch"
    }

    #[instrument(skip(self, channels), fields(channel_count = channels.len()))]
    async fn fetch_live_statuses(
        &self,
        channels: &[ChannelName],
    ) -> Result<Vec<LiveSession>, FetchError> {
        if channels.is_empty() {
            return Ok(Vec::new());
        }

        let credential = self.credentials.current().ok_or(FetchError::Unauthorized)?;
        let url = self.streams_url(channels)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(credential.token())
            .header(CLIENT_ID_HEADER, &self.client_id)
            .send()
            .await
            .map_err(|e| FetchError::transient(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                warn!("Helix rejected the app access token");
                return Err(FetchError::Unauthorized);
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "Helix streams request failed");
                return Err(FetchError::transient(Some(status.as_u16()), body));
            }
        }

        let headers = response.headers();
        if let (Some(remaining), Some(limit)) = (
            headers.get(RATELIMIT_REMAINING_HEADER),
            headers.get(RATELIMIT_LIMIT_HEADER),
        ) {
            debug!(ratelimit_remaining = ?remaining, ratelimit_limit = ?limit, "Helix rate-limit bucket");
        }

        let body: HelixDataResponse<HelixStream> = response.json().await.map_err(|e| {
            FetchError::transient(Some(status.as_u16()), format!("invalid streams body: {e}"))
        })?;

        let sessions: Vec<LiveSession> = body.data.into_iter().map(LiveSession::from).collect();
        debug!(live_count = sessions.len(), "fetched live statuses");
        Ok(sessions)
    }
}
