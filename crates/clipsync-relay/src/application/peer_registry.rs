//! Peer registry: the relay's table of connected clients.
//!
//! Every accepted connection is registered together with its
//! [`OutboundQueue`].  Broadcasting a frame pushes it onto every queue
//! *except* the sender's, which is the relay's half of echo suppression.
//!
//! The registry is plain data; the network layer wraps it in an async mutex
//! so registration, removal, and broadcast are serialized.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::outbound_queue::{OutboundQueue, PushOutcome, SharedFrame};

/// Identity of one connection.
///
/// The remote address alone is not unique over time (a client can reconnect
/// from the same port), so the registry adds a nonce that is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId {
    pub addr: SocketAddr,
    pub nonce: u64,
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.addr, self.nonce)
    }
}

/// Connected peers and their outbound queues.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, Arc<OutboundQueue>>,
    next_nonce: u64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new peer and returns its id.
    pub fn register(&mut self, addr: SocketAddr, queue: Arc<OutboundQueue>) -> PeerId {
        self.next_nonce += 1;
        let id = PeerId {
            addr,
            nonce: self.next_nonce,
        };
        self.peers.insert(id, queue);
        id
    }

    /// Removes a peer.  Returns its queue, or `None` if it was already gone.
    pub fn remove(&mut self, id: &PeerId) -> Option<Arc<OutboundQueue>> {
        self.peers.remove(id)
    }

    /// Queues `frame` for every peer other than `from`.
    ///
    /// Returns the number of peers the frame was queued for.
    pub fn broadcast(&self, from: &PeerId, frame: &SharedFrame) -> usize {
        self.peers
            .iter()
            .filter(|(id, _)| *id != from)
            .filter(|(_, queue)| queue.push(Arc::clone(frame)) != PushOutcome::Closed)
            .count()
    }

    /// Closes every queue and empties the registry.
    pub fn close_all(&mut self) {
        for (_, queue) in self.peers.drain() {
            queue.close();
        }
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
