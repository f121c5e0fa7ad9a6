//! Bot command front end.
//!
//! Long-polls `getUpdates` and answers `/start` with a static greeting. It
//! shares only the Telegram transport with the poller and runs until its
//! cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notification::channels::{ChatId, IncomingMessage, MessageTransport, TelegramChannel};
use crate::notification::DeliveryError;

/// Reply sent to `/start`.
pub const GREETING: &str =
    "Hi! I'm a stream notification bot. I post an alert to the configured channel whenever a tracked streamer goes live.";

/// Server-side wait for `getUpdates`.
pub const DEFAULT_LONG_POLL_SECS: u64 = 30;

/// Pause after a failed `getUpdates` before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Answers `/start` in any chat the bot is messaged in.
pub struct GreetingResponder {
    channel: Arc<TelegramChannel>,
    long_poll_secs: u64,
}

impl GreetingResponder {
    pub fn new(channel: Arc<TelegramChannel>) -> Self {
        Self {
            channel,
            long_poll_secs: DEFAULT_LONG_POLL_SECS,
        }
    }

    pub fn with_long_poll_secs(mut self, secs: u64) -> Self {
        self.long_poll_secs = secs;
        self
    }

    /// Poll until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Starting Telegram command polling");
        let mut offset = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once(offset) => result,
            };

            match result {
                Ok(next) => offset = next,
                Err(e) => {
                    warn!(error = %e, "Telegram getUpdates failed");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Telegram command polling stopped");
    }

    /// Fetch one batch of updates, answer any `/start`, and return the next offset.
    ///
    /// A failed reply is logged and does not hold back the offset.
    pub async fn poll_once(&self, offset: i64) -> Result<i64, DeliveryError> {
        let updates = self.channel.get_updates(offset, self.long_poll_secs).await?;
        debug!(count = updates.len(), "Received Telegram updates");

        let mut next = offset;
        for update in updates {
            next = next.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            if message.text.as_deref().is_some_and(is_start_command) {
                self.greet(&message).await;
            }
        }
        Ok(next)
    }

    async fn greet(&self, message: &IncomingMessage) {
        let chat = ChatId::Id(message.chat.id);
        match self
            .channel
            .send_message(&chat, GREETING, Some(message.message_id))
            .await
        {
            Ok(()) => debug!(chat_id = message.chat.id, "Greeting sent"),
            Err(e) => warn!(chat_id = message.chat.id, error = %e, "Failed to send greeting"),
        }
    }
}

/// `/start`, `/start@botname` and `/start <payload>` all count.
pub fn is_start_command(text: &str) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    match command.strip_prefix("/start") {
        Some("") => true,
        Some(rest) => rest.len() > 1 && rest.starts_with('@'),
        None => false,
    }
}
