//! Stormcast wire protocol.
//!
//! Everything that crosses the network lives here:
//!
//! - [`frame`]: length-prefixed framing over a byte stream. A frame is a
//!   4-byte big-endian length followed by exactly that many payload bytes.
//! - [`message`]: the text grammar carried inside frames (`USER:`, `ALERT:`,
//!   `HEARTBEAT`, ...). Payloads are UTF-8 before encryption; after the
//!   handshake the same grammar travels as ciphertext.
//! - [`alert`]: the alert record broadcast to every session, serialized as a
//!   self-describing JSON object.
//!
//! This crate is pure protocol: no sockets, no cipher, no registry. The
//! server and client crates drive it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod errors;
pub mod frame;
pub mod message;

pub use alert::{Alert, Priority};
pub use errors::{FrameError, ProtocolError};
pub use frame::{read_frame, write_frame, MAX_FRAME_LEN};
pub use message::WireMessage;
