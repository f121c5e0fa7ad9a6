mod twitch;

pub use twitch::{TWITCH_TOKEN_URL, TwitchCredentialManager};
