//! `XChaCha20-Poly1305` cipher session with an atomically swappable key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CipherError;

/// Raw key length in bytes. The text form is `2 * KEY_LEN` hex characters.
pub const KEY_LEN: usize = 32;

/// `XChaCha20` nonce length. Prepended to every ciphertext.
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag size appended by the AEAD.
const TAG_LEN: usize = 16;

/// The active key and the cipher instance bound to it.
///
/// Always replaced as a unit so the key bytes and the algorithm instance can
/// never disagree.
struct ActiveKey {
    material: Zeroizing<[u8; KEY_LEN]>,
    cipher: XChaCha20Poly1305,
}

impl ActiveKey {
    fn new(material: [u8; KEY_LEN]) -> Self {
        let cipher = XChaCha20Poly1305::new((&material).into());
        Self { material: Zeroizing::new(material), cipher }
    }
}

/// Symmetric cipher session.
///
/// Shared by reference between the connection workers and the broadcaster;
/// interior locking makes [`install_key`](Self::install_key) an atomic swap
/// visible to all of them. One session per server process (all connections
/// share the key) or per client connection.
///
/// Ciphertext layout: `[nonce: 24 bytes] + [ciphertext + tag]`.
pub struct CipherSession {
    active: std::sync::RwLock<Option<ActiveKey>>,
}

impl CipherSession {
    /// Create a session with no key installed (plaintext-only).
    pub fn empty() -> Self {
        Self { active: std::sync::RwLock::new(None) }
    }

    /// Create a session with a freshly generated random key.
    pub fn generate() -> Self {
        let mut material = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut material);

        Self { active: std::sync::RwLock::new(Some(ActiveKey::new(material))) }
    }

    /// Create a session from the hex text form of a key.
    pub fn from_key_text(text: &str) -> Result<Self, CipherError> {
        let session = Self::empty();
        session.install_key(text)?;
        Ok(session)
    }

    /// Validate `text` as hex key material and atomically install it.
    ///
    /// On any validation failure the previously installed key (if any) stays
    /// active; the swap is all-or-nothing.
    pub fn install_key(&self, text: &str) -> Result<(), CipherError> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| CipherError::invalid_key(format!("not valid hex: {e}")))?;

        let material: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            CipherError::invalid_key(format!("expected {KEY_LEN} bytes, got {}", b.len()))
        })?;

        *self.write_lock() = Some(ActiveKey::new(material));
        Ok(())
    }

    /// Whether a key is currently installed.
    pub fn has_key(&self) -> bool {
        self.read_lock().is_some()
    }

    /// Hex text form of the installed key, for `ENCRYPTION_KEY:` delivery.
    ///
    /// `None` while the session is plaintext-only.
    pub fn key_text(&self) -> Option<String> {
        self.read_lock().as_ref().map(|key| hex::encode(key.material.as_slice()))
    }

    /// Encrypt `plaintext` under the installed key.
    ///
    /// # Errors
    ///
    /// [`CipherError::InvalidKey`] if no key is installed.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let guard = self.read_lock();
        let key = guard.as_ref().ok_or_else(|| CipherError::invalid_key("no key installed"))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let Ok(sealed) = key.cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
            unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
        };

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt `ciphertext` under the installed key.
    ///
    /// # Errors
    ///
    /// - [`CipherError::InvalidKey`] if no key is installed
    /// - [`CipherError::BadCiphertext`] if the input is too short to carry a
    ///   nonce and tag, or fails authentication
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let guard = self.read_lock();
        let key = guard.as_ref().ok_or_else(|| CipherError::invalid_key("no key installed"))?;

        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::BadCiphertext);
        }

        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        key.cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::BadCiphertext)
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Option<ActiveKey>> {
        self.active.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Option<ActiveKey>> {
        self.active.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("CipherSession").field("has_key", &self.has_key()).finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let session = CipherSession::generate();
        let plaintext = b"Weather Alert: storm inbound";

        let sealed = session.encrypt(plaintext).unwrap();
        assert_ne!(&sealed[NONCE_LEN..], plaintext.as_slice());

        let opened = session.decrypt(&sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn key_text_round_trips_through_install() {
        let server = CipherSession::generate();
        let key_text = server.key_text().unwrap();
        assert_eq!(key_text.len(), KEY_LEN * 2);

        let client = CipherSession::from_key_text(&key_text).unwrap();
        let sealed = server.encrypt(b"hello").unwrap();
        assert_eq!(client.decrypt(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn plaintext_only_session_refuses_both_directions() {
        let session = CipherSession::empty();
        assert!(!session.has_key());
        assert!(matches!(session.encrypt(b"x"), Err(CipherError::InvalidKey { .. })));
        assert!(matches!(session.decrypt(&[0u8; 64]), Err(CipherError::InvalidKey { .. })));
    }

    #[test]
    fn install_rejects_malformed_key_without_clobbering() {
        let session = CipherSession::generate();
        let before = session.key_text().unwrap();

        assert!(session.install_key("not hex at all").is_err());
        assert!(session.install_key("deadbeef").is_err()); // wrong length

        assert_eq!(session.key_text().unwrap(), before, "failed install must not swap");
    }

    #[test]
    fn install_swaps_key_for_all_holders() {
        let session = CipherSession::generate();
        let old_sealed = session.encrypt(b"before swap").unwrap();

        let replacement = CipherSession::generate().key_text().unwrap();
        session.install_key(&replacement).unwrap();

        // Old ciphertext no longer authenticates under the new key.
        assert!(matches!(session.decrypt(&old_sealed), Err(CipherError::BadCiphertext)));
        assert_eq!(session.key_text().unwrap(), replacement);
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let session = CipherSession::generate();
        let sealed = session.encrypt(b"payload").unwrap();

        assert!(matches!(
            session.decrypt(&sealed[..NONCE_LEN + TAG_LEN - 1]),
            Err(CipherError::BadCiphertext)
        ));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let session = CipherSession::generate();
        let mut sealed = session.encrypt(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;

        assert!(matches!(session.decrypt(&sealed), Err(CipherError::BadCiphertext)));
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let a = CipherSession::generate();
        let b = CipherSession::generate();

        let sealed = a.encrypt(b"secret").unwrap();
        assert!(matches!(b.decrypt(&sealed), Err(CipherError::BadCiphertext)));
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 1..2048)) {
            let session = CipherSession::generate();
            let sealed = session.encrypt(&payload).unwrap();
            prop_assert_eq!(session.decrypt(&sealed).unwrap(), payload);
        }
    }
}
