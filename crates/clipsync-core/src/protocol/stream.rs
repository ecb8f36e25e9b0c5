//! Async frame reader and writer.
//!
//! Both the relay and the client move whole frames over TCP.  These helpers
//! sit between a raw byte stream and the codec: [`read_frame`] returns one
//! complete frame (length prefix included) so the relay can forward it
//! byte-for-byte, and [`write_frame`] pushes one out.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::protocol::codec::{FrameLimits, FramingError};
use crate::protocol::messages::LENGTH_PREFIX_SIZE;

/// Most body memory reserved before any body bytes have arrived.  Larger
/// frames grow the buffer as data is actually read.
const MAX_INITIAL_RESERVATION: usize = 64 * 1024;

/// Reads one complete frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary, which
/// is how a peer closing its connection looks.  The declared length is checked
/// against `limits` before any body memory is reserved, and at most
/// 64 KiB is reserved up front however large the declared body is.
///
/// # Errors
///
/// - [`FramingError::FrameTooLarge`] if the prefix is over the limit.
/// - [`FramingError::UnexpectedEof`] if the stream ends mid-frame.
/// - [`FramingError::Io`] on a transport failure.
pub async fn read_frame<R>(
    reader: &mut R,
    limits: FrameLimits,
) -> Result<Option<Vec<u8>>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_SIZE {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FramingError::UnexpectedEof {
                needed: LENGTH_PREFIX_SIZE,
                available: filled,
            });
        }
        filled += n;
    }

    let declared = limits.check_declared(prefix)?;

    let mut frame = Vec::with_capacity(initial_capacity(declared));
    frame.extend_from_slice(&prefix);
    let read = (&mut *reader)
        .take(declared as u64)
        .read_to_end(&mut frame)
        .await?;
    if read < declared {
        return Err(FramingError::UnexpectedEof {
            needed: declared,
            available: read,
        });
    }

    trace!("read frame of {declared} body bytes");
    Ok(Some(frame))
}

fn initial_capacity(declared: usize) -> usize {
    LENGTH_PREFIX_SIZE + declared.min(MAX_INITIAL_RESERVATION)
}

/// Writes one complete frame and flushes it.
///
/// # Errors
///
/// Returns [`FramingError::Io`] if the transport fails.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
