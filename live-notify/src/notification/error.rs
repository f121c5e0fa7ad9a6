use thiserror::Error;

/// Errors raised while handing a message to the messaging transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request never got a response (connect failure, timeout, ...).
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The messaging API answered with an error.
    #[error("API error {code}: {description}")]
    Api {
        code: u16,
        description: String,
        /// Seconds the API asked us to wait (rate limiting).
        retry_after: Option<u64>,
    },

    /// The response could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        // Bot API URLs embed the bot token; never let it reach an error message.
        Self::Network(err.without_url())
    }
}

impl DeliveryError {
    /// Whether the API asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { code: 429, .. })
    }
}
