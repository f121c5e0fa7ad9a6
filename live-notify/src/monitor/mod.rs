//! Stream monitoring.
//!
//! - [`HelixClient`]: batched live status queries against Twitch Helix
//! - [`StreamStatusTracker`]: live set and per-snapshot transitions

mod detector;
mod helix;
mod session;
mod tracker;

pub use detector::{FetchError, LiveStatusSource};
pub use helix::{HELIX_API_BASE, HelixClient};
pub use session::{ChannelName, LiveSession};
pub use tracker::{DiffResult, StreamStatusTracker};
