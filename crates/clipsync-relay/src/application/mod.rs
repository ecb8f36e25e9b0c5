//! Application layer for the relay.
//!
//! - **`peer_registry`** – Connected peers and broadcast with sender
//!   exclusion.
//! - **`outbound_queue`** – Bounded, drop-oldest queue feeding each peer's
//!   write loop.

pub mod outbound_queue;
pub mod peer_registry;
