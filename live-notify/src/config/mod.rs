//! Process configuration.
//!
//! Everything is read from the environment once at startup. [`AppConfig::load`]
//! seeds the environment from a `.env` file (if present) first.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::monitor::ChannelName;
use crate::notification::channels::{ChatId, TelegramConfig};

pub const ENV_TWITCH_CLIENT_ID: &str = "TWITCH_CLIENT_ID";
pub const ENV_TWITCH_CLIENT_SECRET: &str = "TWITCH_CLIENT_SECRET";
pub const ENV_TWITCH_CHANNELS: &str = "TWITCH_CHANNELS";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_POLL_INTERVAL_SECS: &str = "POLL_INTERVAL_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const ENV_LOG_DIR: &str = "LOG_DIR";

/// Default delay between two poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default timeout applied to every outbound HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Helix accepts at most this many `user_login` values in one `streams` query.
pub const MAX_TRACKED_CHANNELS: usize = 100;

/// Longest login Twitch allows.
pub const MAX_LOGIN_LEN: usize = 25;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Fully validated application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Twitch application client id.
    pub client_id: String,
    /// Twitch application client secret.
    pub client_secret: String,
    /// Tracked channels, lower-cased and de-duplicated, in configured order.
    pub channels: Vec<ChannelName>,
    /// Telegram bot and destination chat.
    pub telegram: TelegramConfig,
    /// Delay between poll cycles.
    pub poll_interval: Duration,
    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("channels", &self.channels)
            .field("telegram", &self.telegram)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl AppConfig {
    /// Seed the environment from `.env` (if present), then read it.
    ///
    /// A missing `.env` is fine; an unreadable or malformed one is an error.
    pub fn load() -> crate::Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(crate::Error::other(format!("failed to load .env: {e}")));
        }
        Ok(Self::from_env()?)
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(var))
        };
        let optional = |var: &'static str| -> Option<String> {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let client_id = required(ENV_TWITCH_CLIENT_ID)?;
        let client_secret = required(ENV_TWITCH_CLIENT_SECRET)?;
        let channels = parse_channels(&required(ENV_TWITCH_CHANNELS)?)?;

        let bot_token = required(ENV_TELEGRAM_BOT_TOKEN)?;
        let chat_id: ChatId = required(ENV_TELEGRAM_CHAT_ID)?
            .parse()
            .map_err(|reason: String| ConfigError::invalid(ENV_TELEGRAM_CHAT_ID, reason))?;

        let poll_interval = match optional(ENV_POLL_INTERVAL_SECS) {
            Some(raw) => {
                let secs = parse_secs(ENV_POLL_INTERVAL_SECS, &raw)?;
                if secs == 0 {
                    return Err(ConfigError::invalid(
                        ENV_POLL_INTERVAL_SECS,
                        "must be greater than zero",
                    ));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_POLL_INTERVAL,
        };

        let request_timeout = match optional(ENV_REQUEST_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(parse_secs(ENV_REQUEST_TIMEOUT_SECS, &raw)?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            client_id,
            client_secret,
            channels,
            telegram: TelegramConfig::new(bot_token, chat_id),
            poll_interval,
            request_timeout,
            log_dir: optional(ENV_LOG_DIR).map(PathBuf::from),
        })
    }
}

fn parse_secs(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .map_err(|e| ConfigError::invalid(var, format!("'{raw}' is not a whole number of seconds ({e})")))
}

fn is_valid_login(login: &str) -> bool {
    (1..=MAX_LOGIN_LEN).contains(&login.len())
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a comma separated channel list, dropping blanks and duplicates.
fn parse_channels(raw: &str) -> Result<Vec<ChannelName>, ConfigError> {
    let mut seen = HashSet::new();
    let channels: Vec<ChannelName> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ChannelName::new)
        .filter(|name| seen.insert(name.clone()))
        .collect();

    if channels.is_empty() {
        return Err(ConfigError::invalid(
            ENV_TWITCH_CHANNELS,
            "expected at least one channel name",
        ));
    }

    if let Some(bad) = channels.iter().find(|name| !is_valid_login(name.as_str())) {
        return Err(ConfigError::invalid(
            ENV_TWITCH_CHANNELS,
            format!("'{bad}' is not a Twitch login (1-{MAX_LOGIN_LEN} letters, digits or '_')"),
        ));
    }

    if channels.len() > MAX_TRACKED_CHANNELS {
        return Err(ConfigError::invalid(
            ENV_TWITCH_CHANNELS,
            format!(
                "{} channels configured, at most {} are supported",
                channels.len(),
                MAX_TRACKED_CHANNELS
            ),
        ));
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (ENV_TWITCH_CLIENT_ID, "cid".to_string()),
            (ENV_TWITCH_CLIENT_SECRET, "s3cr3t-value".to_string()),
            (ENV_TWITCH_CHANNELS, "Alice, bob ,,ALICE".to_string()),
            (ENV_TELEGRAM_BOT_TOKEN, "123:ABC".to_string()),
            (ENV_TELEGRAM_CHAT_ID, "-1001234".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_and_channel_normalisation() {
        let config = load(&base_env()).unwrap();

        assert_eq!(
            config.channels,
            vec![ChannelName::new("alice"), ChannelName::new("bob")]
        );
        assert_eq!(config.telegram.chat_id, ChatId::Id(-1001234));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_missing_variable_is_named() {
        let mut env = base_env();
        env.remove(ENV_TELEGRAM_BOT_TOKEN);

        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_TELEGRAM_BOT_TOKEN)));
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_blank_channel_list_rejected() {
        let mut env = base_env();
        env.insert(ENV_TWITCH_CHANNELS, " , ,".to_string());

        let err = load(&env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: ENV_TWITCH_CHANNELS,
                ..
            }
        ));
    }

    #[test]
    fn test_too_many_channels_rejected() {
        let mut env = base_env();
        let list: Vec<String> = (0..=MAX_TRACKED_CHANNELS).map(|i| format!("ch{i}")).collect();
        env.insert(ENV_TWITCH_CHANNELS, list.join(","));

        assert!(load(&env).is_err());
    }

    #[test]
    fn test_malformed_login_rejected() {
        for raw in ["alice, bad name", "alice,https://twitch.tv/bob", &"x".repeat(MAX_LOGIN_LEN + 1)] {
            let mut env = base_env();
            env.insert(ENV_TWITCH_CHANNELS, raw.to_string());
            assert!(
                matches!(
                    load(&env),
                    Err(ConfigError::Invalid {
                        var: ENV_TWITCH_CHANNELS,
                        ..
                    })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_chat_id_username_and_garbage() {
        let mut env = base_env();
        env.insert(ENV_TELEGRAM_CHAT_ID, "@my_channel".to_string());
        let config = load(&env).unwrap();
        assert_eq!(
            config.telegram.chat_id,
            ChatId::Username("@my_channel".to_string())
        );

        env.insert(ENV_TELEGRAM_CHAT_ID, "not-a-chat".to_string());
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid {
                var: ENV_TELEGRAM_CHAT_ID,
                ..
            }
        ));
    }

    #[test]
    fn test_optional_tuning() {
        let mut env = base_env();
        env.insert(ENV_POLL_INTERVAL_SECS, "15".to_string());
        env.insert(ENV_REQUEST_TIMEOUT_SECS, "3".to_string());
        env.insert(ENV_LOG_DIR, "/tmp/live-notify".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/live-notify")));

        env.insert(ENV_POLL_INTERVAL_SECS, "0".to_string());
        assert!(load(&env).is_err());

        env.insert(ENV_POLL_INTERVAL_SECS, "soon".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cr3t-value"));
        assert!(!rendered.contains("123:ABC"));
    }
}
