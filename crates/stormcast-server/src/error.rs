//! Server error types.
//!
//! Propagation policy: every per-connection error stays inside that
//! connection's task. Nothing here ever reaches the accept loop, the
//! registry, or another connection; the task logs, deregisters, and exits.

use stormcast_crypto::CipherError;
use stormcast_proto::{FrameError, ProtocolError};
use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing key, etc.).
    ///
    /// Fatal at startup; fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure (peer reset, closed socket, bind failure).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Frame codec failure. Always fatal to the connection it occurred on.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Cipher failure. Fatal to the connection, never to the process.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Wire grammar failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Handshake-phase authentication failures.
///
/// Both variants result in a plaintext `AUTH_FAIL` reply and a closed
/// connection, never a crash.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials were well-formed but not in the table.
    #[error("invalid credentials for user {username:?}")]
    BadCredentials {
        /// The username that was presented.
        username: String,
    },

    /// The credential frame did not match `USER:<username>:<password>`.
    #[error("malformed credential frame")]
    MalformedFrame,
}
