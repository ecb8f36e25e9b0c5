//! Binary codec for clipsync frames.
//!
//! Wire format:
//! ```text
//! [frame_len:4][version:1][kind:1][reserved:2][sequence:8][origin:16][content:N]
//! ```
//! `frame_len` covers everything after the prefix. All multi-byte integers
//! are big-endian. See [`crate::protocol::messages`] for the constants.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::content::{ClipboardContent, ClipboardSnapshot, ImageData};
use crate::protocol::messages::{
    ContentKind, BODY_HEADER_SIZE, DEFAULT_MAX_FRAME_LEN, IMAGE_HEADER_SIZE, LENGTH_PREFIX_SIZE,
    PROTOCOL_VERSION,
};

/// Errors that can occur while framing, encoding, or decoding a snapshot.
///
/// Any of these on an established connection means the byte stream can no
/// longer be trusted; the owner closes the connection.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The length prefix declares more bytes than [`FrameLimits`] allows.
    #[error("declared frame length {declared} exceeds maximum {max}")]
    FrameTooLarge { declared: usize, max: usize },

    /// The snapshot would not fit in a single frame.
    #[error("payload of {size} bytes exceeds maximum frame length {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream or buffer ended inside a frame.
    #[error("unexpected end of frame: need {needed} bytes, got {available}")]
    UnexpectedEof { needed: usize, available: usize },

    /// The version byte is not one we understand.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The content kind byte is not a recognized value.
    #[error("unknown content kind: 0x{0:02X}")]
    UnknownContentKind(u8),

    /// The body could not be parsed (bad UTF-8, inconsistent image size, etc.).
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The underlying transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Size limits applied when encoding and decoding frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest accepted body length (excluding the 4-byte prefix).
    pub max_frame_len: usize,
}

impl FrameLimits {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            // The prefix is a u32; anything larger could never be expressed.
            max_frame_len: max_frame_len.min(u32::MAX as usize),
        }
    }

    /// Validates a decoded length prefix against the limit.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::FrameTooLarge`] when the declared length is
    /// over the limit.
    pub fn check_declared(&self, prefix: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize, FramingError> {
        let declared = u32::from_be_bytes(prefix) as usize;
        if declared > self.max_frame_len {
            return Err(FramingError::FrameTooLarge {
                declared,
                max: self.max_frame_len,
            });
        }
        Ok(declared)
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`ClipboardSnapshot`] into a complete frame, length prefix
/// included.
///
/// # Errors
///
/// Returns [`FramingError::PayloadTooLarge`] if the body would exceed
/// `limits.max_frame_len`, or [`FramingError::MalformedBody`] for an image
/// whose pixel buffer does not match its dimensions.
///
/// # Examples
///
/// ```rust
/// use clipsync_core::{decode_frame, encode_snapshot, ClipboardSnapshot, FrameLimits};
/// use uuid::Uuid;
///
/// let snapshot = ClipboardSnapshot::new(Uuid::new_v4(), 1, "hello".into());
/// let frame = encode_snapshot(&snapshot, FrameLimits::default()).unwrap();
/// let (decoded, consumed) = decode_frame(&frame, FrameLimits::default()).unwrap();
/// assert_eq!(decoded, snapshot);
/// assert_eq!(consumed, frame.len());
/// ```
pub fn encode_snapshot(
    snapshot: &ClipboardSnapshot,
    limits: FrameLimits,
) -> Result<Vec<u8>, FramingError> {
    let content_len = match &snapshot.content {
        ClipboardContent::Text(text) => text.len(),
        ClipboardContent::Image(image) => {
            if !image.is_well_formed() {
                return Err(FramingError::MalformedBody(format!(
                    "image {}x{} carries {} pixel bytes",
                    image.width,
                    image.height,
                    image.rgba.len()
                )));
            }
            IMAGE_HEADER_SIZE + image.rgba.len()
        }
    };

    let body_len = BODY_HEADER_SIZE + content_len;
    if body_len > limits.max_frame_len {
        return Err(FramingError::PayloadTooLarge {
            size: body_len,
            max: limits.max_frame_len,
        });
    }

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + body_len);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());

    // Body header: version (1) + kind (1) + reserved (2) + sequence (8) +
    //              origin (16) = 28 bytes
    buf.push(PROTOCOL_VERSION);
    buf.push(ContentKind::of(&snapshot.content) as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&snapshot.sequence.to_be_bytes());
    buf.extend_from_slice(snapshot.origin.as_bytes());

    match &snapshot.content {
        ClipboardContent::Text(text) => buf.extend_from_slice(text.as_bytes()),
        ClipboardContent::Image(image) => encode_image(&mut buf, image),
    }
    Ok(buf)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the snapshot and the number of bytes consumed (prefix + body), so
/// the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`FramingError`] if the prefix is over the limit, the buffer is
/// truncated, or the body is malformed.
pub fn decode_frame(
    bytes: &[u8],
    limits: FrameLimits,
) -> Result<(ClipboardSnapshot, usize), FramingError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(FramingError::UnexpectedEof {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        });
    }

    let declared = limits.check_declared([bytes[0], bytes[1], bytes[2], bytes[3]])?;
    let total = LENGTH_PREFIX_SIZE + declared;
    if bytes.len() < total {
        return Err(FramingError::UnexpectedEof {
            needed: total,
            available: bytes.len(),
        });
    }

    let snapshot = decode_body(&bytes[LENGTH_PREFIX_SIZE..total])?;
    Ok((snapshot, total))
}

/// Decodes a frame body (everything after the length prefix).
///
/// # Errors
///
/// Returns [`FramingError`] on an unknown version or kind, or a malformed
/// content section.
pub fn decode_body(body: &[u8]) -> Result<ClipboardSnapshot, FramingError> {
    require_len(body, BODY_HEADER_SIZE, "header")?;

    let version = body[0];
    if version != PROTOCOL_VERSION {
        return Err(FramingError::UnsupportedVersion(version));
    }

    let kind_byte = body[1];
    let kind =
        ContentKind::try_from(kind_byte).map_err(|_| FramingError::UnknownContentKind(kind_byte))?;

    // body[2..4] are reserved – ignored on decode

    let sequence = read_u64(body, 4)?;
    let origin = read_uuid(body, 12)?;
    let content_bytes = &body[BODY_HEADER_SIZE..];

    let content = match kind {
        ContentKind::Text => {
            let text = std::str::from_utf8(content_bytes)
                .map_err(|e| FramingError::MalformedBody(format!("invalid UTF-8: {e}")))?;
            ClipboardContent::Text(text.to_string())
        }
        ContentKind::Image => ClipboardContent::Image(decode_image(content_bytes)?),
    };

    Ok(ClipboardSnapshot {
        origin,
        sequence,
        content,
    })
}

// ── Content helpers ───────────────────────────────────────────────────────────

fn encode_image(buf: &mut Vec<u8>, image: &ImageData) {
    buf.extend_from_slice(&image.width.to_be_bytes());
    buf.extend_from_slice(&image.height.to_be_bytes());
    buf.extend_from_slice(&image.rgba);
}

fn decode_image(p: &[u8]) -> Result<ImageData, FramingError> {
    require_len(p, IMAGE_HEADER_SIZE, "image header")?;
    let width = read_u32(p, 0)?;
    let height = read_u32(p, 4)?;
    let image = ImageData {
        width,
        height,
        rgba: p[IMAGE_HEADER_SIZE..].to_vec(),
    };
    if !image.is_well_formed() {
        return Err(FramingError::MalformedBody(format!(
            "image {width}x{height} carries {} pixel bytes",
            image.rgba.len()
        )));
    }
    Ok(image)
}

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), FramingError> {
    if buf.len() < needed {
        Err(FramingError::MalformedBody(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, FramingError> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| FramingError::MalformedBody(format!("need 4 bytes at offset {offset}")))?;
    Ok(u32::from_be_bytes(bytes))
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, FramingError> {
    let bytes: [u8; 8] = buf
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| FramingError::MalformedBody(format!("need 8 bytes at offset {offset}")))?;
    Ok(u64::from_be_bytes(bytes))
}

fn read_uuid(buf: &[u8], offset: usize) -> Result<Uuid, FramingError> {
    let bytes: [u8; 16] = buf
        .get(offset..offset + 16)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| {
            FramingError::MalformedBody(format!("need 16 bytes for UUID at offset {offset}"))
        })?;
    Ok(Uuid::from_bytes(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
