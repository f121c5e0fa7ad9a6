//! Live state tracking across poll cycles.
//!
//! The tracker owns the set of channels currently believed to be live and
//! turns each new snapshot into a [`DiffResult`]. A channel only re-enters
//! `went_live` after it has been reported in `went_offline`, which is what
//! limits notifications to one per live session.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use super::session::{ChannelName, LiveSession};

/// Transitions computed from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Sessions for channels that were offline before this snapshot, in discovery order.
    pub went_live: Vec<LiveSession>,
    /// Channels that were live before this snapshot and are now absent.
    pub went_offline: BTreeSet<ChannelName>,
}

impl DiffResult {
    /// Whether the snapshot changed nothing.
    pub fn is_empty(&self) -> bool {
        self.went_live.is_empty() && self.went_offline.is_empty()
    }
}

/// Holds the live set and computes transitions against new snapshots.
#[derive(Debug)]
pub struct StreamStatusTracker {
    tracked: HashSet<ChannelName>,
    live: HashMap<ChannelName, LiveSession>,
}

impl StreamStatusTracker {
    /// Create a tracker for a fixed list of channels with an empty live set.
    pub fn new(tracked: impl IntoIterator<Item = ChannelName>) -> Self {
        Self {
            tracked: tracked.into_iter().collect(),
            live: HashMap::new(),
        }
    }

    /// Apply a snapshot of currently live sessions.
    ///
    /// Channels live in both the previous state and the snapshot are left as
    /// they were, even if their title or category changed.
    pub fn diff(&mut self, observed: Vec<LiveSession>) -> DiffResult {
        let mut seen: HashSet<ChannelName> = HashSet::with_capacity(observed.len());
        let mut snapshot = Vec::with_capacity(observed.len());

        for session in observed {
            if !self.tracked.contains(&session.channel) {
                warn!(channel = %session.channel, "ignoring session for untracked channel");
                continue;
            }
            if seen.insert(session.channel.clone()) {
                snapshot.push(session);
            } else {
                debug!(channel = %session.channel, "duplicate session in snapshot, keeping the first");
            }
        }

        let mut result = DiffResult::default();

        for session in snapshot {
            if self.live.contains_key(&session.channel) {
                continue;
            }
            info!(
                channel = %session.channel,
                session_id = %session.session_id,
                "channel went live"
            );
            self.live.insert(session.channel.clone(), session.clone());
            result.went_live.push(session);
        }

        let ended: Vec<ChannelName> = self
            .live
            .keys()
            .filter(|channel| !seen.contains(*channel))
            .cloned()
            .collect();

        for channel in ended {
            self.live.remove(&channel);
            info!(channel = %channel, "channel went offline");
            result.went_offline.insert(channel);
        }

        result
    }

    /// Whether the channel is currently believed to be live.
    pub fn is_live(&self, channel: &ChannelName) -> bool {
        self.live.contains_key(channel)
    }

    /// The session recorded when the channel went live.
    pub fn session(&self, channel: &ChannelName) -> Option<&LiveSession> {
        self.live.get(channel)
    }

    /// Channels currently believed to be live, sorted.
    pub fn live_channels(&self) -> BTreeSet<ChannelName> {
        self.live.keys().cloned().collect()
    }

    /// Number of channels currently believed to be live.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
