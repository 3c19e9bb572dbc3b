//! Cipher error types.

use thiserror::Error;

/// Errors from the cipher session.
///
/// Both variants are fatal to the connection they occurred on and never fatal
/// to the process.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Key material was malformed, or an operation required a key and none
    /// was installed.
    #[error("invalid key material: {reason}")]
    InvalidKey {
        /// What was wrong with the key.
        reason: String,
    },

    /// Ciphertext was truncated, corrupted, or failed authentication.
    #[error("ciphertext could not be authenticated")]
    BadCiphertext,
}

impl CipherError {
    pub(crate) fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey { reason: reason.into() }
    }
}
