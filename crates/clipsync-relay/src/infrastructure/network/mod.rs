//! Network infrastructure for the relay.

pub mod relay;
