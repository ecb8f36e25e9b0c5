//! Infrastructure layer for the client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `clipsync_core`, but MUST NOT be imported by the `application` layer
//! (tests excepted).
//!
//! # Sub-modules
//!
//! - **`clipboard`** – [`ClipboardAccess`] implementations: the system
//!   clipboard via `arboard`, a native Wayland backend on Linux, and an
//!   in-memory clipboard for tests.
//!
//! - **`network`** – The sync client: connects to the relay, exchanges
//!   framed snapshots, and reconnects with backoff when the link drops.
//!
//! [`ClipboardAccess`]: crate::application::watch_clipboard::ClipboardAccess

pub mod clipboard;
pub mod network;
