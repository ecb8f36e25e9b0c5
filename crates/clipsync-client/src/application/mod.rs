//! Application layer use cases for the client.
//!
//! - **`watch_clipboard`** – The change watcher.  Detects local clipboard
//!   changes by polling and applies remote updates ("absorb") so that they
//!   are never detected as local changes and echoed back.
//!
//! - **`replay_guard`** – Remembers the newest sequence applied from each
//!   origin so duplicate or stale snapshots never touch the clipboard.

pub mod replay_guard;
pub mod watch_clipboard;
