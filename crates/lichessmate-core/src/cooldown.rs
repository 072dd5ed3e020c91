//! Per-player report cooldowns.

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

use crate::domain::PlayerId;

/// Players announced recently, keyed by id with the time of their last report.
///
/// Entries are only dropped by [`CooldownTracker::evict_expired`], which the
/// poller calls at the start of every cycle.
#[derive(Clone, Debug, Default)]
pub struct CooldownTracker {
    reported: HashMap<PlayerId, Instant>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on_cooldown(&self, id: &PlayerId) -> bool {
        self.reported.contains_key(id)
    }

    pub fn mark_reported(&mut self, id: PlayerId, now: Instant) {
        self.reported.insert(id, now);
    }

    /// Drop every entry older than `cooldown`. Returns how many were removed.
    pub fn evict_expired(&mut self, now: Instant, cooldown: Duration) -> usize {
        let before = self.reported.len();
        self.reported
            .retain(|_, reported_at| now.saturating_duration_since(*reported_at) <= cooldown);
        before - self.reported.len()
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }
}
