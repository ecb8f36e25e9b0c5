//! clipsync-client library entry point.
//!
//! The client is the process that runs on every machine taking part in the
//! sync.  It:
//!
//! 1. Polls the local clipboard through a [`ClipboardAccess`] backend and
//!    turns each genuine change into a [`clipsync_core::ClipboardSnapshot`].
//! 2. Keeps one TCP connection to the relay open, reconnecting with
//!    exponential backoff whenever it drops.
//! 3. Sends local snapshots to the relay and applies snapshots from other
//!    machines to the local clipboard without re-detecting them as changes.
//!
//! [`ClipboardAccess`]: application::watch_clipboard::ClipboardAccess

/// Application layer: change detection and replay protection.
pub mod application;

/// Infrastructure layer: clipboard backends and the relay connection.
pub mod infrastructure;

pub use application::replay_guard::ReplayGuard;
pub use application::watch_clipboard::{
    ChangeWatcher, ClipboardAccess, ClipboardAccessError, WatcherState,
};
pub use infrastructure::clipboard::mock::MemoryClipboard;
pub use infrastructure::network::{
    ClientNetworkError, ConnectionState, SyncClient, SyncClientConfig,
};
