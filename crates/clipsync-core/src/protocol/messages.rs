//! Wire constants for the clipsync frame format.
//!
//! ```text
//! [frame_len:4][version:1][kind:1][reserved:2][sequence:8][origin:16][content:N]
//! ```
//!
//! `frame_len` counts every byte after itself.  Image content starts with
//! `[width:4][height:4]` followed by the RGBA pixels.  All multi-byte
//! integers are big-endian.

use crate::domain::content::ClipboardContent;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current body layout version.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of the big-endian length prefix in front of every body.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the fixed body header (version, kind, reserved, sequence, origin).
pub const BODY_HEADER_SIZE: usize = 28;

/// Size of the width/height header in front of image pixels.
pub const IMAGE_HEADER_SIZE: usize = 8;

/// Default upper bound for a frame body (16 MiB).
///
/// Large enough for a full-HD RGBA screenshot, small enough that a corrupt
/// length prefix cannot exhaust memory.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

// ── Content kinds ─────────────────────────────────────────────────────────────

/// Content kind byte at offset 1 of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentKind {
    Text = 0x01,
    Image = 0x02,
}

impl ContentKind {
    /// Returns the kind matching a content value.
    pub fn of(content: &ClipboardContent) -> Self {
        match content {
            ClipboardContent::Text(_) => ContentKind::Text,
            ClipboardContent::Image(_) => ContentKind::Image,
        }
    }
}

impl TryFrom<u8> for ContentKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ContentKind::Text),
            0x02 => Ok(ContentKind::Image),
            _ => Err(()),
        }
    }
}
