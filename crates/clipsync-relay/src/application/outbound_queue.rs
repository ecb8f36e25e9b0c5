//! Bounded per-peer outbound queue.
//!
//! The relay's broadcast path must never wait on a slow peer, so pushing is
//! synchronous and never blocks: when a peer's queue is full the *oldest*
//! pending frame is discarded.  Clipboard sync is last-write-wins, so the
//! newest frame is always the one worth keeping.
//!
//! Each queue has exactly one consumer, the peer's write loop, which waits in
//! [`OutboundQueue::pop`] until a frame arrives or the queue is closed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

/// Default number of frames buffered per peer.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// A raw frame shared between every queue it was broadcast to.
pub type SharedFrame = std::sync::Arc<[u8]>;

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<SharedFrame>,
    closed: bool,
    dropped: u64,
}

/// Result of [`OutboundQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame was queued.
    Queued,
    /// The frame was queued after discarding the oldest pending frame.
    DroppedOldest,
    /// The queue is closed; the frame was discarded.
    Closed,
}

/// Frames waiting to be written to one peer.
#[derive(Debug)]
pub struct OutboundQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl OutboundQueue {
    /// Creates a queue holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues `frame`, evicting the oldest pending frame if full.
    pub fn push(&self, frame: SharedFrame) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            let outcome = if state.frames.len() >= self.capacity {
                state.frames.pop_front();
                state.dropped += 1;
                debug!(
                    "outbound queue full; dropped oldest frame ({} so far)",
                    state.dropped
                );
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            state.frames.push_back(frame);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Waits for the next frame.  Returns `None` once the queue is closed;
    /// frames still pending at that point are discarded.
    pub async fn pop(&self) -> Option<SharedFrame> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
            }
            notified.await;
        }
    }

    /// Closes the queue and wakes the consumer.  Further pushes are ignored.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.frames.clear();
        }
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of frames waiting to be written.
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
