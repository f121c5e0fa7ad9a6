//! Channel identifiers and observed live sessions.

use std::fmt;

/// Case-insensitive channel login.
///
/// The inner value is always lower-cased so equality, hashing and ordering
/// ignore the case the name was configured or reported with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One observed live broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSession {
    /// Channel login the broadcast belongs to.
    pub channel: ChannelName,
    /// Platform-assigned broadcast id.
    pub session_id: String,
    /// Stream title.
    pub title: String,
    /// Category / game name; empty when the streamer has not set one.
    pub game_name: String,
    /// Preview image URL containing `{width}` and `{height}` placeholders.
    pub thumbnail_url_template: String,
    /// Display name of the streamer (preserves the streamer's own casing).
    pub display_name: String,
}
