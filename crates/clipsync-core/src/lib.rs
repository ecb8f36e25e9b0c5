//! # clipsync-core
//!
//! Shared library for clipsync containing the clipboard snapshot model and
//! the length-prefixed wire codec.
//!
//! This crate is used by both the relay and the client.  It has no
//! dependencies on OS clipboard APIs or concrete sockets; the async frame
//! reader and writer are generic over any `AsyncRead` / `AsyncWrite`.
//!
//! # Architecture overview
//!
//! clipsync keeps the clipboards of several machines on a LAN in sync.  One
//! machine runs a *relay*, every other machine runs a *client* that watches
//! its local clipboard and talks to the relay over TCP.
//!
//! - **`domain`** – What travels: [`ClipboardContent`] (text or an RGBA
//!   image) wrapped in a [`ClipboardSnapshot`] tagged with the origin client
//!   and a per-origin sequence number.
//!
//! - **`protocol`** – How it travels: a 4-byte big-endian length prefix
//!   followed by a fixed, versioned body.  Decoding is bounded by
//!   [`FrameLimits`] so a hostile peer cannot make us allocate arbitrary
//!   amounts of memory.

pub mod domain;
pub mod protocol;

pub use domain::content::{ClipboardContent, ClipboardSnapshot, ImageData, OriginId};
pub use protocol::codec::{decode_frame, encode_snapshot, FrameLimits, FramingError};
pub use protocol::stream::{read_frame, write_frame};
