//! Length-prefixed frame codec.
//!
//! Layout on the wire: `[length: 4 bytes, big-endian u32] + [payload: length
//! bytes]`. The codec is all-or-nothing: [`read_frame`] either returns a
//! complete payload or fails, never a partial one.
//!
//! # Invariants
//!
//! - `length > 0` and `length` equals the exact payload byte count. A zero
//!   length or a stream that closes mid-frame is a terminal read failure.
//! - `length <= MAX_FRAME_LEN`. Oversized claims are rejected before any
//!   payload allocation.
//!
//! Callers must serialize writes per connection; the codec writes the prefix
//! and payload as one buffer so serialized writers never interleave frames.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::FrameError;

/// Maximum accepted frame payload size (16 MiB).
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Write one frame: the 4-byte big-endian length of `payload`, then `payload`.
///
/// The prefix and payload are written as a single buffer followed by a flush,
/// so two callers that serialize access to `writer` can never interleave
/// partial frames.
///
/// # Errors
///
/// - [`FrameError::InvalidLength`] if `payload` is empty
/// - [`FrameError::TooLarge`] if `payload` exceeds [`MAX_FRAME_LEN`]
/// - [`FrameError::Io`] on transport failure
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Err(FrameError::InvalidLength);
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| FrameError::TooLarge { len: u32::MAX, max: MAX_FRAME_LEN })?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len, max: MAX_FRAME_LEN });
    }

    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;

    Ok(())
}

/// Read one frame: block until 4 length bytes are available, then until
/// exactly that many payload bytes arrive. Returns the payload.
///
/// # Errors
///
/// - [`FrameError::ShortRead`] if the peer closes before the prefix or the
///   payload is complete
/// - [`FrameError::InvalidLength`] if the decoded length is zero
/// - [`FrameError::TooLarge`] if the decoded length exceeds [`MAX_FRAME_LEN`]
/// - [`FrameError::Io`] on any other transport failure
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    read_exact_or_short(reader, &mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Err(FrameError::InvalidLength);
    }
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len, max: MAX_FRAME_LEN });
    }

    let mut payload = vec![0u8; len as usize];
    read_exact_or_short(reader, &mut payload).await?;

    Ok(payload)
}

/// `read_exact` with early EOF mapped to [`FrameError::ShortRead`].
async fn read_exact_or_short<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(FrameError::ShortRead { wanted: buf.len() })
        },
        Err(e) => Err(FrameError::Io(e)),
    }
}
