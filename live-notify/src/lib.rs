//! live-notify library crate.
//!
//! Polls Twitch for a fixed set of channels and posts a Telegram photo
//! message when one of them goes live.

pub mod app;
pub mod bot;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;
pub mod utils;

pub use error::{Error, Result};
