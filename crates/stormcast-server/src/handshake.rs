//! Per-connection handshake state machine.
//!
//! Pure protocol logic with no I/O: the connection supervisor feeds each
//! received plaintext frame into [`Handshake::on_frame`] and executes the
//! returned actions against the socket and the registry. States follow the
//! canonical two-step protocol:
//!
//! ```text
//! UNAUTHENTICATED --USER:u:p--> AUTHENTICATING --match--> KEY_DELIVERED
//!                                              --mismatch/malformed--> CLOSED
//! KEY_DELIVERED --CIPHER_OK--> ACTIVE
//!               --anything else--> CLOSED
//! ```
//!
//! Credentials and the encryption key travel in plaintext by design: the key
//! is meant to be read by a human operator and pasted into the peer. Only
//! post-handshake traffic is encrypted.

use std::sync::Arc;

use stormcast_proto::WireMessage;

use crate::{auth::CredentialStore, error::AuthError};

/// Handshake protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the plaintext credential frame.
    Unauthenticated,
    /// Credential frame received, lookup in progress.
    Authenticating,
    /// `AUTH_SUCCESS` and the key have been sent; waiting for `CIPHER_OK`.
    KeyDelivered,
    /// Handshake complete; the steady-state loop owns the connection.
    Active,
    /// Terminal. Reachable from every other state.
    Closed,
}

/// Actions for the supervisor to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Write a plaintext frame.
    SendPlain(WireMessage),
    /// Encrypt the text under the session cipher and write it as a frame.
    SendEncrypted(String),
    /// Insert this connection into the session registry.
    RegisterSession,
    /// Close the connection. Always the final action when present.
    Close {
        /// Why the handshake ended.
        reason: String,
    },
}

/// Handshake driver for one connection.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    session_id: String,
    key_text: String,
    credentials: Arc<CredentialStore>,
}

impl Handshake {
    /// Start a handshake for the connection identified by `session_id`,
    /// delivering `key_text` on auth success.
    pub fn new(session_id: String, key_text: String, credentials: Arc<CredentialStore>) -> Self {
        Self { state: HandshakeState::Unauthenticated, session_id, key_text, credentials }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Whether the handshake has reached a state where no more frames are
    /// expected by this machine.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, HandshakeState::Active | HandshakeState::Closed)
    }

    /// Feed one received plaintext frame payload; returns actions to execute.
    pub fn on_frame(&mut self, payload: &str) -> Vec<HandshakeAction> {
        match self.state {
            HandshakeState::Unauthenticated => self.on_credentials(payload),
            HandshakeState::KeyDelivered => self.on_confirmation(payload),
            HandshakeState::Authenticating | HandshakeState::Active | HandshakeState::Closed => {
                // Authenticating only exists inside on_credentials; frames in
                // Active belong to the steady-state loop, frames in Closed to
                // nobody.
                Vec::new()
            },
        }
    }

    fn on_credentials(&mut self, payload: &str) -> Vec<HandshakeAction> {
        self.state = HandshakeState::Authenticating;

        let (username, password) = match WireMessage::parse(payload) {
            Ok(WireMessage::User { username, password }) => (username, password),
            _ => return self.fail_auth(&AuthError::MalformedFrame),
        };

        if !self.credentials.verify(&username, &password) {
            return self.fail_auth(&AuthError::BadCredentials { username });
        }

        self.state = HandshakeState::KeyDelivered;
        vec![
            HandshakeAction::SendPlain(WireMessage::AuthSuccess),
            HandshakeAction::SendPlain(WireMessage::EncryptionKey(self.key_text.clone())),
        ]
    }

    fn on_confirmation(&mut self, payload: &str) -> Vec<HandshakeAction> {
        if !matches!(WireMessage::parse(payload), Ok(WireMessage::CipherOk)) {
            self.state = HandshakeState::Closed;
            return vec![HandshakeAction::Close {
                reason: "expected CIPHER_OK confirmation".to_string(),
            }];
        }

        self.state = HandshakeState::Active;
        vec![
            HandshakeAction::RegisterSession,
            HandshakeAction::SendEncrypted(format!(
                "Welcome {}! You are connected to the server.",
                self.session_id
            )),
        ]
    }

    fn fail_auth(&mut self, error: &AuthError) -> Vec<HandshakeAction> {
        self.state = HandshakeState::Closed;
        vec![
            HandshakeAction::SendPlain(WireMessage::AuthFail),
            HandshakeAction::Close { reason: error.to_string() },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> Handshake {
        Handshake::new(
            "127.0.0.1:4242".to_string(),
            "aa".repeat(32),
            Arc::new(CredentialStore::default()),
        )
    }

    #[test]
    fn valid_credentials_deliver_key() {
        let mut hs = handshake();
        let actions = hs.on_frame("USER:admin:admin123");

        assert_eq!(hs.state(), HandshakeState::KeyDelivered);
        assert_eq!(actions, vec![
            HandshakeAction::SendPlain(WireMessage::AuthSuccess),
            HandshakeAction::SendPlain(WireMessage::EncryptionKey("aa".repeat(32))),
        ]);
    }

    #[test]
    fn bad_credentials_fail_and_close() {
        let mut hs = handshake();
        let actions = hs.on_frame("USER:admin:wrong");

        assert_eq!(hs.state(), HandshakeState::Closed);
        assert_eq!(actions[0], HandshakeAction::SendPlain(WireMessage::AuthFail));
        assert!(matches!(actions[1], HandshakeAction::Close { .. }));
    }

    #[test]
    fn malformed_credential_frame_fails_and_closes() {
        for payload in ["LOGIN:admin:admin123", "USER:admin", "HEARTBEAT", ""] {
            let mut hs = handshake();
            let actions = hs.on_frame(payload);

            assert_eq!(hs.state(), HandshakeState::Closed, "payload {payload:?}");
            assert_eq!(actions[0], HandshakeAction::SendPlain(WireMessage::AuthFail));
            assert!(matches!(actions[1], HandshakeAction::Close { .. }));
        }
    }

    #[test]
    fn cipher_ok_activates_and_registers_before_welcome() {
        let mut hs = handshake();
        hs.on_frame("USER:admin:admin123");
        let actions = hs.on_frame("CIPHER_OK");

        assert_eq!(hs.state(), HandshakeState::Active);
        assert_eq!(actions[0], HandshakeAction::RegisterSession);
        assert_eq!(
            actions[1],
            HandshakeAction::SendEncrypted(
                "Welcome 127.0.0.1:4242! You are connected to the server.".to_string()
            )
        );
    }

    #[test]
    fn wrong_confirmation_closes_without_registering() {
        let mut hs = handshake();
        hs.on_frame("USER:user1:pass123");
        let actions = hs.on_frame("CIPHER_NOT_OK");

        assert_eq!(hs.state(), HandshakeState::Closed);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], HandshakeAction::Close { .. }));
        assert!(!actions.contains(&HandshakeAction::RegisterSession));
    }

    #[test]
    fn closed_is_terminal() {
        let mut hs = handshake();
        hs.on_frame("USER:admin:wrong");
        assert_eq!(hs.state(), HandshakeState::Closed);

        assert!(hs.on_frame("USER:admin:admin123").is_empty());
        assert_eq!(hs.state(), HandshakeState::Closed);
    }

    #[test]
    fn active_machine_ignores_further_frames() {
        let mut hs = handshake();
        hs.on_frame("USER:admin:admin123");
        hs.on_frame("CIPHER_OK");
        assert!(hs.is_finished());

        assert!(hs.on_frame("HEARTBEAT").is_empty());
        assert_eq!(hs.state(), HandshakeState::Active);
    }
}
