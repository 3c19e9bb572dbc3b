//! Text message grammar carried inside frames.
//!
//! Every protocol line is a UTF-8 string, optionally encrypted after the
//! handshake. Tagged lines use `TAG:value` with `:` separators; bare lines
//! (`AUTH_SUCCESS`, `HEARTBEAT`, ...) are compared exactly. Anything
//! unrecognized parses as [`WireMessage::Text`] so the steady-state loop can
//! log it as a generic message instead of dropping the connection.

use crate::{
    alert::Alert,
    errors::ProtocolError,
};

/// One protocol message, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// `USER:<username>:<password>` — plaintext credential presentation.
    User {
        /// Claimed username.
        username: String,
        /// Claimed password.
        password: String,
    },
    /// `AUTH_SUCCESS` — credentials accepted.
    AuthSuccess,
    /// `AUTH_FAIL` — credentials rejected or handshake frame malformed.
    AuthFail,
    /// `ENCRYPTION_KEY:<hex>` — plaintext key delivery after auth success.
    EncryptionKey(String),
    /// `CIPHER_OK` — client confirms the key is installed.
    CipherOk,
    /// `ALERT:<json>` — encrypted alert fan-out.
    Alert(Alert),
    /// `ACK:<alert_id>` — encrypted delivery acknowledgment.
    Ack(u64),
    /// `HEARTBEAT` — encrypted liveness probe.
    Heartbeat,
    /// `HEARTBEAT_OK` — encrypted liveness reply.
    HeartbeatOk,
    /// `SERVER_SHUTDOWN` — best-effort teardown notice.
    ServerShutdown,
    /// Anything else, passed through for generic logging.
    Text(String),
}

impl WireMessage {
    /// Encode to the wire string.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(match self {
            Self::User { username, password } => format!("USER:{username}:{password}"),
            Self::AuthSuccess => "AUTH_SUCCESS".to_string(),
            Self::AuthFail => "AUTH_FAIL".to_string(),
            Self::EncryptionKey(key) => format!("ENCRYPTION_KEY:{key}"),
            Self::CipherOk => "CIPHER_OK".to_string(),
            Self::Alert(alert) => format!("ALERT:{}", alert.to_json()?),
            Self::Ack(alert_id) => format!("ACK:{alert_id}"),
            Self::Heartbeat => "HEARTBEAT".to_string(),
            Self::HeartbeatOk => "HEARTBEAT_OK".to_string(),
            Self::ServerShutdown => "SERVER_SHUTDOWN".to_string(),
            Self::Text(text) => text.clone(),
        })
    }

    /// Parse a wire string.
    ///
    /// # Errors
    ///
    /// Tagged lines with a bad shape (`USER:` with a missing field, `ACK:`
    /// with a non-integer id, `ALERT:` with invalid JSON, `ENCRYPTION_KEY:`
    /// with an empty key) are errors. Untagged unknown lines are not; they
    /// parse as [`WireMessage::Text`].
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        match line {
            "AUTH_SUCCESS" => return Ok(Self::AuthSuccess),
            "AUTH_FAIL" => return Ok(Self::AuthFail),
            "CIPHER_OK" => return Ok(Self::CipherOk),
            "HEARTBEAT" => return Ok(Self::Heartbeat),
            "HEARTBEAT_OK" => return Ok(Self::HeartbeatOk),
            "SERVER_SHUTDOWN" => return Ok(Self::ServerShutdown),
            _ => {},
        }

        if let Some(rest) = line.strip_prefix("USER:") {
            let (username, password) = rest.split_once(':').ok_or(ProtocolError::Malformed {
                tag: "USER",
                reason: "expected USER:<username>:<password>".to_string(),
            })?;
            if username.is_empty() {
                return Err(ProtocolError::Malformed {
                    tag: "USER",
                    reason: "empty username".to_string(),
                });
            }
            return Ok(Self::User {
                username: username.to_string(),
                password: password.to_string(),
            });
        }

        if let Some(key) = line.strip_prefix("ENCRYPTION_KEY:") {
            if key.is_empty() {
                return Err(ProtocolError::Malformed {
                    tag: "ENCRYPTION_KEY",
                    reason: "empty key".to_string(),
                });
            }
            return Ok(Self::EncryptionKey(key.to_string()));
        }

        if let Some(json) = line.strip_prefix("ALERT:") {
            return Ok(Self::Alert(Alert::from_json(json)?));
        }

        if let Some(id) = line.strip_prefix("ACK:") {
            let alert_id = id.parse().map_err(|_| ProtocolError::Malformed {
                tag: "ACK",
                reason: format!("non-integer alert id {id:?}"),
            })?;
            return Ok(Self::Ack(alert_id));
        }

        Ok(Self::Text(line.to_string()))
    }

    /// Parse a raw frame payload (UTF-8 check, then grammar).
    pub fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        Self::parse(std::str::from_utf8(payload)?)
    }
}
