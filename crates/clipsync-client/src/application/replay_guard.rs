//! Per-origin replay guard.
//!
//! The relay forwards frames in the order it received them, but a client that
//! reconnects may see the same snapshot again (the sender re-sends its latest
//! pending change after a reconnect).  The guard remembers the highest
//! sequence applied from each origin and rejects anything at or below it, so
//! a duplicate frame never causes a second clipboard write.

use std::collections::HashMap;

use clipsync_core::{ClipboardSnapshot, OriginId};
use tracing::trace;

/// Tracks the newest sequence number applied per originating client.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    applied: HashMap<OriginId, u64>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `snapshot` is newer than anything already applied
    /// from its origin, and records it.  Returns `false` for replays and
    /// out-of-order stragglers.
    pub fn accept(&mut self, snapshot: &ClipboardSnapshot) -> bool {
        match self.applied.get(&snapshot.origin) {
            Some(&last) if snapshot.sequence <= last => {
                trace!(
                    "dropping replay from {} (seq {} <= {last})",
                    snapshot.origin,
                    snapshot.sequence
                );
                false
            }
            _ => {
                self.applied.insert(snapshot.origin, snapshot.sequence);
                true
            }
        }
    }

    /// Highest sequence applied from `origin`, if any.
    pub fn last_applied(&self, origin: &OriginId) -> Option<u64> {
        self.applied.get(origin).copied()
    }

    /// Number of origins seen so far.
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
