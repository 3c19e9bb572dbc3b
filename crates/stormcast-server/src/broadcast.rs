//! Alert fan-out to every registered session.
//!
//! Snapshot, iterate, send, evict: the registry lock is held only for the
//! snapshot copy, sends run outside it, and sessions whose send failed are
//! deregistered exactly once after the pass. Delivery is best-effort and
//! unordered across sessions; one session's failure never blocks or rolls
//! back delivery to others, and no send is retried.

use std::sync::Arc;

use stormcast_crypto::CipherSession;
use stormcast_proto::{Alert, WireMessage};

use crate::{
    error::ServerError,
    registry::{Session, SessionRegistry},
};

/// Result of one fan-out pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Sessions the frame was written to.
    pub delivered: usize,
    /// Session ids evicted after a failed send.
    pub evicted: Vec<String>,
}

/// Fan-out engine over a session registry.
///
/// Shares the registry and cipher with the connection supervisor; cheap to
/// clone into the alert-producer task.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
    cipher: Arc<CipherSession>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry` using `cipher` for all sessions.
    pub fn new(registry: Arc<SessionRegistry>, cipher: Arc<CipherSession>) -> Self {
        Self { registry, cipher }
    }

    /// Deliver `alert` to every session registered at call time.
    ///
    /// A session whose send fails (cipher or transport) is deregistered
    /// before this returns; no other session is affected.
    pub async fn broadcast(&self, alert: &Alert) -> Result<BroadcastOutcome, ServerError> {
        let line = WireMessage::Alert(alert.clone()).encode()?;
        let snapshot = self.registry.snapshot();

        let mut outcome = BroadcastOutcome::default();
        for (id, session) in snapshot {
            match self.send_encrypted(&session, &line).await {
                Ok(()) => {
                    tracing::debug!(session = %id, alert_id = alert.alert_id, "alert sent");
                    outcome.delivered += 1;
                },
                Err(e) => {
                    tracing::warn!(session = %id, error = %e, "send failed, evicting session");
                    outcome.evicted.push(id);
                },
            }
        }

        for id in &outcome.evicted {
            self.registry.deregister(id);
            tracing::info!(session = %id, "removed disconnected session");
        }

        Ok(outcome)
    }

    /// Send `SERVER_SHUTDOWN` to every registered session, best-effort, then
    /// empty the registry.
    ///
    /// Returns the number of sessions that were notified.
    pub async fn shutdown_all(&self) -> Result<usize, ServerError> {
        let line = WireMessage::ServerShutdown.encode()?;
        let snapshot = self.registry.snapshot();

        let mut notified = 0;
        for (id, session) in snapshot {
            if let Err(e) = self.send_encrypted(&session, &line).await {
                tracing::debug!(session = %id, error = %e, "shutdown notice not delivered");
            } else {
                notified += 1;
            }
            self.registry.deregister(&id);
        }

        Ok(notified)
    }

    async fn send_encrypted(&self, session: &Session, line: &str) -> Result<(), ServerError> {
        let sealed = self.cipher.encrypt(line.as_bytes())?;
        session.send(&sealed).await?;
        Ok(())
    }
}
