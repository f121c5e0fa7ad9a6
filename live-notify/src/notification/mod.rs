//! Notification delivery.
//!
//! - [`NotificationDispatcher`]: formats a went-live session into a photo post
//! - [`MessageTransport`]: outbound messaging seam, implemented by [`TelegramChannel`]

pub mod channels;
mod dispatcher;
mod error;

pub use channels::{ChatId, MessageTransport, TelegramChannel, TelegramConfig};
pub use dispatcher::{CAPTION_LIMIT, NotificationDispatcher, build_caption, thumbnail_url};
pub use error::DeliveryError;
