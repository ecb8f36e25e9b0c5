//! Infrastructure layer for the relay: TCP networking.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `clipsync_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
