//! Concurrent-safe session registry.
//!
//! Maps session ids (`"<ip>:<port>"`) to registered sessions. One mutex
//! guards registration, deregistration, and snapshotting; it is held only for
//! the map operation itself and never across network I/O, so a stalled peer
//! cannot block membership changes for anyone else.

use std::{collections::HashMap, sync::Arc};

use stormcast_proto::{write_frame, FrameError};
use tokio::io::AsyncWrite;

/// Shared, per-connection serialized write handle.
///
/// All frames to one client go through this single writer; the inner mutex
/// enforces the single-writer-per-connection discipline the frame codec
/// requires.
pub type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Wrap a raw write half into a [`SharedWriter`].
pub fn shared_writer<W>(writer: W) -> SharedWriter
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    Arc::new(tokio::sync::Mutex::new(Box::new(writer)))
}

/// A registered, authenticated, encrypted-mode connection.
///
/// Created at successful handshake completion; owned by the registry until
/// disconnect or send-failure eviction.
#[derive(Clone)]
pub struct Session {
    writer: SharedWriter,
    /// Whether the handshake authenticated this session. Always true for
    /// registry-owned sessions; kept explicit for diagnostics.
    pub authenticated: bool,
    /// Whether post-handshake traffic to this session is encrypted.
    pub encrypted: bool,
}

impl Session {
    /// Create a session around an already-shared writer.
    pub fn new(writer: SharedWriter) -> Self {
        Self { writer, authenticated: true, encrypted: true }
    }

    /// Write one frame to this session, serialized against other writers.
    pub async fn send(&self, payload: &[u8]) -> Result<(), FrameError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, payload).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.authenticated)
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

/// Registry of active sessions.
///
/// `register`, `deregister`, and `snapshot` are linearizable with respect to
/// each other: all three take the same lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: std::sync::Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `session` under `id`.
    ///
    /// If `id` is already present the new session replaces the old one
    /// (last-writer-wins, no merge).
    pub fn register(&self, id: impl Into<String>, session: Session) {
        self.lock().insert(id.into(), session);
    }

    /// Remove `id` if present. Idempotent: removing an absent id is a no-op.
    ///
    /// Returns whether an entry was removed.
    pub fn deregister(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Copy of the current `(id, session)` pairs.
    ///
    /// Iteration happens outside the lock so slow sends during broadcast do
    /// not block concurrent registration or deregistration.
    pub fn snapshot(&self) -> Vec<(String, Session)> {
        self.lock().iter().map(|(id, s)| (id.clone(), s.clone())).collect()
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        let (local, _peer) = tokio::io::duplex(64);
        Session::new(shared_writer(local))
    }

    #[test]
    fn register_and_lookup() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        registry.register("127.0.0.1:1000", test_session());
        assert!(registry.contains("127.0.0.1:1000"));
        assert!(!registry.contains("127.0.0.1:2000"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_same_id_replaces() {
        let registry = SessionRegistry::new();

        registry.register("127.0.0.1:1000", test_session());
        registry.register("127.0.0.1:1000", test_session());

        assert_eq!(registry.len(), 1, "last writer wins, no duplicate entries");
    }

    #[test]
    fn deregister_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.register("127.0.0.1:1000", test_session());

        assert!(registry.deregister("127.0.0.1:1000"));
        assert!(!registry.deregister("127.0.0.1:1000"));
        assert!(!registry.deregister("never-registered"));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let registry = SessionRegistry::new();
        registry.register("a", test_session());
        registry.register("b", test_session());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);

        // Mutating the registry after the snapshot does not affect it.
        registry.deregister("a");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn session_send_writes_one_frame() {
        let (mut client, server) = tokio::io::duplex(1024);

        let session = Session::new(shared_writer(server));
        session.send(b"hello").await.expect("send should succeed");

        let payload = stormcast_proto::read_frame(&mut client).await.expect("read frame");
        assert_eq!(payload, b"hello");
    }
}
