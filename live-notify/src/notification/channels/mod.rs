//! Messaging transports.
//!
//! Only Telegram is implemented; the trait keeps the dispatcher independent
//! of it so tests can substitute a recording transport.

mod telegram;

pub use telegram::{
    Chat, ChatId, IncomingMessage, TELEGRAM_API_BASE, TelegramChannel, TelegramConfig, Update,
};

use async_trait::async_trait;

use super::DeliveryError;

/// Outbound messaging capability shared by the poller and the command front end.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Get the transport type name.
    fn channel_type(&self) -> &'static str;

    /// Post an image with a caption to `destination`.
    async fn send_photo(
        &self,
        destination: &ChatId,
        image_url: &str,
        caption: &str,
    ) -> Result<(), DeliveryError>;

    /// Post a plain text message, optionally as a reply.
    async fn send_message(
        &self,
        destination: &ChatId,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), DeliveryError>;
}
