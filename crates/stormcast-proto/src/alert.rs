//! Alert record broadcast to every active session.

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// Alert priority, derived from environmental readings by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Routine conditions.
    Low,
    /// Conditions worth watching.
    Medium,
    /// Conditions requiring attention.
    High,
}

impl Priority {
    /// Wire spelling of the priority (`LOW`, `MEDIUM`, `HIGH`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated alert. Immutable once produced.
///
/// Serialized as a self-describing JSON object for transport inside an
/// `ALERT:` message. `alert_id` is echoed verbatim by clients in `ACK:`
/// replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Severity of the alert.
    pub priority: Priority,
    /// Human-readable alert text.
    pub message: String,
    /// Generation time, formatted `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    /// Unique id, echoed in client acknowledgments.
    pub alert_id: u64,
}

impl Alert {
    /// Serialize to the JSON transport encoding.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from the JSON transport encoding.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
