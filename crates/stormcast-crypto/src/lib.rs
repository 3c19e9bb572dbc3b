//! Symmetric cipher session for Stormcast.
//!
//! A [`CipherSession`] holds one swappable symmetric key and the AEAD
//! instance bound to it. Installing a new key atomically replaces both;
//! before a key is installed the session is plaintext-only and both
//! [`CipherSession::encrypt`] and [`CipherSession::decrypt`] fail.
//!
//! The cipher is `XChaCha20-Poly1305`. Its key travels over the wire as hex
//! text inside the plaintext `ENCRYPTION_KEY:` handshake message - that is a
//! deliberate, documented protocol weakness (the key is meant to be read and
//! confirmed by a human operator), not an oversight. Do not assume
//! confidentiality against an observer of the handshake.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod error;

pub use cipher::{CipherSession, KEY_LEN, NONCE_LEN};
pub use error::CipherError;
