//! Protocol error types.

use thiserror::Error;

/// Errors from the frame codec.
///
/// Every variant is fatal to the connection it occurred on: a stream that has
/// desynchronized from the length prefix cannot be resynchronized.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream before a complete frame arrived, either
    /// inside the 4-byte length prefix or inside the payload.
    #[error("peer closed stream before a complete frame (wanted {wanted} bytes)")]
    ShortRead {
        /// Number of bytes the codec was waiting for when the stream ended.
        wanted: usize,
    },

    /// The decoded length prefix was zero. A zero-length frame is a terminal
    /// read failure, not a message.
    #[error("frame length of zero is not a valid message")]
    InvalidLength,

    /// The decoded length exceeds [`MAX_FRAME_LEN`](crate::MAX_FRAME_LEN).
    ///
    /// Guards against a hostile or corrupt length prefix forcing a huge
    /// allocation.
    #[error("frame length {len} exceeds the {max} byte limit")]
    TooLarge {
        /// Length claimed by the prefix.
        len: u32,
        /// Configured limit.
        max: u32,
    },

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from parsing or encoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A tagged message did not match its expected shape.
    #[error("malformed {tag} message: {reason}")]
    Malformed {
        /// Message tag, e.g. `USER` or `ACK`.
        tag: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// An `ALERT:` payload carried an invalid alert record.
    #[error("invalid alert record: {0}")]
    BadAlert(#[from] serde_json::Error),

    /// A frame payload was not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
}
