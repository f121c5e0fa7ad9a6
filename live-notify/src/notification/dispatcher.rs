//! Turns a went-live session into a photo post for the configured destination.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::DeliveryError;
use super::channels::{ChatId, MessageTransport};
use crate::monitor::LiveSession;

/// Telegram's limit for photo captions.
pub const CAPTION_LIMIT: usize = 1024;

const THUMBNAIL_WIDTH: &str = "1280";
const THUMBNAIL_HEIGHT: &str = "720";
const CHANNEL_URL_BASE: &str = "https://www.twitch.tv";
const NO_GAME: &str = "N/A";
const DISPLAY_NAME_MAX: usize = 64;
const GAME_MAX: usize = 128;

/// Formats live announcements and hands them to the transport.
pub struct NotificationDispatcher {
    transport: Arc<dyn MessageTransport>,
    destination: ChatId,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn MessageTransport>, destination: ChatId) -> Self {
        Self {
            transport,
            destination,
        }
    }

    /// Announce that `session` went live.
    ///
    /// Errors are returned to the caller; nothing is retried here.
    pub async fn notify(&self, session: &LiveSession) -> Result<(), DeliveryError> {
        let image_url = thumbnail_url(&session.thumbnail_url_template, Utc::now());
        let caption = build_caption(session);

        debug!(
            channel = %session.channel,
            chat_id = %self.destination,
            transport = self.transport.channel_type(),
            "Sending live notification"
        );
        self.transport
            .send_photo(&self.destination, &image_url, &caption)
            .await?;

        info!(channel = %session.channel, session_id = %session.session_id, "Live notification sent");
        Ok(())
    }
}

/// Build the HTML caption for a live session.
///
/// Display name and game are capped first, then the title takes whatever is
/// left, so the caption never exceeds [`CAPTION_LIMIT`] characters. The link
/// is never shortened; configured logins are at most 25 characters.
pub fn build_caption(session: &LiveSession) -> String {
    let display_name = if session.display_name.trim().is_empty() {
        session.channel.as_str()
    } else {
        session.display_name.as_str()
    };
    let game = if session.game_name.trim().is_empty() {
        NO_GAME
    } else {
        session.game_name.as_str()
    };
    let link = format!("{CHANNEL_URL_BASE}/{}", session.channel);

    let render = |name: &str, title: &str, game: &str| {
        format!("\u{1f534} <b>{name}</b> is live!\n\n{title}\n\u{1f3ae} {game}\n\n{link}")
    };

    let mut budget = CAPTION_LIMIT.saturating_sub(render("", "", "").chars().count());
    let name = escape_truncated(display_name, budget.min(DISPLAY_NAME_MAX));
    budget -= name.chars().count();
    let game = escape_truncated(game, budget.min(GAME_MAX));
    budget -= game.chars().count();
    let title = escape_truncated(&session.title, budget);

    render(&name, &title, &game)
}

/// Resolve the preview URL at 1280x720 with a cache-busting timestamp.
pub fn thumbnail_url(template: &str, now: DateTime<Utc>) -> String {
    let resolved = template
        .replace("{width}", THUMBNAIL_WIDTH)
        .replace("{height}", THUMBNAIL_HEIGHT);
    let timestamp = now.timestamp().to_string();

    match url::Url::parse(&resolved) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("timestamp", &timestamp);
            url.to_string()
        }
        Err(_) => {
            let separator = if resolved.contains('?') { '&' } else { '?' };
            format!("{resolved}{separator}timestamp={timestamp}")
        }
    }
}

/// Escape text for Telegram's HTML parse mode.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        push_escaped(&mut out, c);
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        _ => out.push(c),
    }
}

/// Escape `text`, cutting it with an ellipsis so the result stays within `budget` chars.
fn escape_truncated(text: &str, budget: usize) -> String {
    let escaped = escape_html(text);
    if escaped.chars().count() <= budget {
        return escaped;
    }

    let ellipsis = '\u{2026}';
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let mut piece = String::new();
        push_escaped(&mut piece, c);
        let len = piece.chars().count();
        if used + len + 1 > budget {
            break;
        }
        out.push_str(&piece);
        used += len;
    }
    if budget > 0 {
        out.push(ellipsis);
    }
    out
}
