//! Telegram Bot API transport.
//!
//! Sends photos and messages via `POST /bot<token>/<method>` and exposes
//! `getUpdates` long polling for the command front end. Requests are made
//! exactly once; a 429 surfaces its `retry_after` in the returned error but is
//! not retried here.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::MessageTransport;
use crate::notification::DeliveryError;

/// Production Bot API base.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Extra time granted to a long-poll request beyond the server-side wait.
const LONG_POLL_GRACE: Duration = Duration::from_secs(15);

/// Telegram destination: a numeric chat id or a public `@channelusername`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl FromStr for ChatId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(Self::Id(id));
        }

        match s.strip_prefix('@') {
            Some(name)
                if !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                Ok(Self::Username(s.to_string()))
            }
            _ => Err(format!(
                "'{s}' is neither a numeric chat id nor an @channelusername"
            )),
        }
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Telegram Bot API token.
    pub bot_token: String,
    /// Target chat for live notifications.
    pub chat_id: ChatId,
    /// Parse mode for message formatting (HTML, Markdown, MarkdownV2).
    pub parse_mode: String,
    /// Bot API base URL.
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: ChatId) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id,
            parse_mode: "HTML".to_string(),
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("parse_mode", &self.parse_mode)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// One incoming update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

/// Incoming chat message (only the fields the bot uses).
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Telegram transport.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel on a shared HTTP client.
    ///
    /// The client must come from [`build_http_client`](crate::utils::http_client::build_http_client)
    /// so the TLS crypto provider is installed.
    pub fn new(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    /// Call a Bot API method once and decode its `result`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, DeliveryError> {
        let mut request = self.client.post(self.method_url(method)).json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            Ok(envelope) if !envelope.ok || !status.is_success() => {
                let err = DeliveryError::Api {
                    code: envelope.error_code.unwrap_or(status.as_u16()),
                    description: envelope
                        .description
                        .unwrap_or_else(|| status.to_string()),
                    retry_after: envelope.parameters.and_then(|p| p.retry_after),
                };
                warn!(method, error = %err, "Telegram request failed");
                Err(err)
            }
            Ok(_) => Err(DeliveryError::Decode(format!(
                "{method} succeeded without a result"
            ))),
            Err(_) if !status.is_success() => {
                warn!(method, status = %status, "Telegram request failed");
                Err(DeliveryError::Api {
                    code: status.as_u16(),
                    description: body,
                    retry_after: None,
                })
            }
            Err(e) => Err(DeliveryError::Decode(format!("{method}: {e}"))),
        }
    }

    /// Long-poll for updates newer than `offset`.
    ///
    /// The HTTP timeout is extended past the shared client's so the request
    /// is not aborted while Telegram holds it open.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, DeliveryError> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let timeout = Duration::from_secs(timeout_secs) + LONG_POLL_GRACE;
        self.call("getUpdates", &payload, Some(timeout)).await
    }
}

#[async_trait]
impl MessageTransport for TelegramChannel {
    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    async fn send_photo(
        &self,
        destination: &ChatId,
        image_url: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let payload = json!({
            "chat_id": destination,
            "photo": image_url,
            "caption": caption,
            "parse_mode": self.config.parse_mode,
        });

        self.call::<serde_json::Value>("sendPhoto", &payload, None)
            .await?;
        debug!(chat_id = %destination, "Telegram photo sent");
        Ok(())
    }

    async fn send_message(
        &self,
        destination: &ChatId,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), DeliveryError> {
        let mut payload = json!({
            "chat_id": destination,
            "text": text,
        });
        if let Some(message_id) = reply_to {
            payload["reply_parameters"] = json!({ "message_id": message_id });
        }

        self.call::<serde_json::Value>("sendMessage", &payload, None)
            .await?;
        debug!(chat_id = %destination, "Telegram message sent");
        Ok(())
    }
}
