//! Clipboard content and snapshots.
//!
//! A [`ClipboardSnapshot`] is one clipboard value tagged with the client that
//! produced it and a sequence number that only ever grows for that client.
//! The pair `(origin, sequence)` identifies a snapshot for deduplication.

use std::fmt;

use uuid::Uuid;

/// Identifies the client process that produced a snapshot.
///
/// Generated once per process with [`Uuid::new_v4`]; a restarted client gets
/// a fresh identity, so its restarted sequence numbers never collide with the
/// ones peers remember for the old identity.
pub type OriginId = Uuid;

/// Raw RGBA8 image as exposed by desktop clipboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA pixels, 4 bytes per pixel.
    pub rgba: Vec<u8>,
}

impl ImageData {
    /// Returns `true` when `rgba` holds exactly `width * height` pixels.
    pub fn is_well_formed(&self) -> bool {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            == Some(self.rgba.len())
    }
}

/// A value that can live on the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    /// UTF-8 text.
    Text(String),
    /// A bitmap image.
    Image(ImageData),
}

impl ClipboardContent {
    /// Short name of the content kind, safe to log.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ClipboardContent::Text(_) => "text",
            ClipboardContent::Image(_) => "image",
        }
    }

    /// Size of the raw content in bytes (text bytes or pixel bytes).
    pub fn byte_len(&self) -> usize {
        match self {
            ClipboardContent::Text(text) => text.len(),
            ClipboardContent::Image(image) => image.rgba.len(),
        }
    }
}

/// Describes the content without revealing it.
///
/// Clipboard data routinely contains passwords and tokens, so log lines use
/// this summary instead of the value itself.
impl fmt::Display for ClipboardContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardContent::Text(text) => write!(f, "text ({} bytes)", text.len()),
            ClipboardContent::Image(image) => {
                write!(f, "image {}x{}", image.width, image.height)
            }
        }
    }
}

impl From<String> for ClipboardContent {
    fn from(value: String) -> Self {
        ClipboardContent::Text(value)
    }
}

impl From<&str> for ClipboardContent {
    fn from(value: &str) -> Self {
        ClipboardContent::Text(value.to_string())
    }
}

impl From<ImageData> for ClipboardContent {
    fn from(value: ImageData) -> Self {
        ClipboardContent::Image(value)
    }
}

/// One clipboard value tagged with its origin and sequence number.
///
/// Immutable once created: the watcher builds one per detected local change,
/// and the codec rebuilds one per decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    /// The client whose clipboard produced this value.
    pub origin: OriginId,
    /// Per-origin sequence number, starting at 1.
    pub sequence: u64,
    /// The clipboard value.
    pub content: ClipboardContent,
}

impl ClipboardSnapshot {
    pub fn new(origin: OriginId, sequence: u64, content: ClipboardContent) -> Self {
        Self {
            origin,
            sequence,
            content,
        }
    }
}

impl fmt::Display for ClipboardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} {}", self.origin, self.sequence, self.content)
    }
}
