//! Domain entities for clipsync.
//!
//! Pure data types with no I/O.  Everything above this layer (codec, relay,
//! client) moves these values around; nothing in here knows about sockets or
//! the OS clipboard.

/// Clipboard content and the sequenced snapshot that carries it.
///
/// See [`content::ClipboardSnapshot`] for the main type.
pub mod content;
