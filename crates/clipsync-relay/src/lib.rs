//! clipsync-relay library entry point.
//!
//! The relay is the hub every client connects to.  It holds no clipboard
//! state: each snapshot a client sends is validated and then forwarded,
//! unchanged, to every *other* connected client.
//!
//! - **`application`** – The peer registry and the bounded per-peer
//!   outbound queue.
//! - **`infrastructure`** – The TCP accept loop and per-peer I/O tasks.

pub mod application;
pub mod infrastructure;

pub use application::outbound_queue::{OutboundQueue, PushOutcome};
pub use application::peer_registry::{PeerId, PeerRegistry};
pub use infrastructure::network::relay::{RelayConfig, RelayError, SharedRegistry, SyncRelay};
