//! Stormcast alert-broadcast server.
//!
//! Accepts TCP connections, runs a plaintext credential handshake that
//! upgrades the connection to symmetric encryption, and fans generated
//! alerts out to every registered session on a timer.
//!
//! Layout mirrors the connection lifecycle:
//!
//! - [`handshake`]: pure state machine for the login/key-delivery exchange
//! - [`auth`]: credential verification
//! - [`registry`]: concurrent session membership
//! - [`broadcast`]: snapshot-based fan-out with send-failure eviction
//! - [`alerts`]: timer-driven alert production
//! - [`Server`]: the supervisor tying them together

pub mod alerts;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod handshake;
pub mod registry;

pub use alerts::{AlertSource, SyntheticWeather};
pub use auth::CredentialStore;
pub use broadcast::{BroadcastOutcome, Broadcaster};
pub use config::ServerConfig;
pub use error::{AuthError, ServerError};
pub use handshake::{Handshake, HandshakeAction, HandshakeState};
pub use registry::{shared_writer, Session, SessionRegistry, SharedWriter};

use std::{net::SocketAddr, sync::Arc, time::Duration};

use stormcast_crypto::CipherSession;
use stormcast_proto::{read_frame, write_frame, FrameError, WireMessage};
use tokio::{
    net::{tcp::OwnedReadHalf, TcpListener, TcpStream},
    sync::watch,
    task::JoinSet,
    time::MissedTickBehavior,
};

/// Listening server with its shared state, ready to [`run`](Server::run).
pub struct Server {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    cipher: Arc<CipherSession>,
    credentials: Arc<CredentialStore>,
    config: ServerConfig,
}

impl Server {
    /// Bind the listening socket and generate the session key.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Config(format!("cannot bind {}: {e}", config.bind_address))
        })?;

        Ok(Self {
            listener,
            registry: Arc::new(SessionRegistry::new()),
            cipher: Arc::new(CipherSession::generate()),
            credentials: Arc::new(CredentialStore::default()),
            config,
        })
    }

    /// Replace the default credential table.
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    /// Actual bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Text form of the session key, for the operator to hand to clients.
    pub fn key_text(&self) -> String {
        // The cipher is generated at bind time and never uninstalled.
        self.cipher.key_text().unwrap_or_default()
    }

    /// Handle to the session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Broadcaster over this server's registry and cipher.
    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster::new(Arc::clone(&self.registry), Arc::clone(&self.cipher))
    }

    /// Run until `shutdown` fires, producing alerts from [`SyntheticWeather`].
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        self.run_with_source(Arc::new(SyntheticWeather::new()), shutdown).await
    }

    /// Run until `shutdown` fires, producing alerts from `source`.
    ///
    /// On shutdown every registered session is sent `SERVER_SHUTDOWN` before
    /// connection tasks are torn down.
    pub async fn run_with_source(
        self,
        source: Arc<dyn AlertSource>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServerError> {
        tracing::info!(address = %self.listener.local_addr()?, "server listening");

        let broadcaster = self.broadcaster();
        let alert_task = tokio::spawn(alert_loop(
            source,
            broadcaster.clone(),
            Arc::clone(&self.registry),
            self.config.alert_interval,
            shutdown.clone(),
        ));

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((socket, addr)) => {
                            if self.registry.len() >= self.config.max_clients {
                                tracing::warn!(%addr, max = self.config.max_clients, "client limit reached, refusing connection");
                                drop(socket);
                                continue;
                            }
                            connections.spawn(handle_connection(
                                socket,
                                addr,
                                Arc::clone(&self.registry),
                                Arc::clone(&self.cipher),
                                Arc::clone(&self.credentials),
                                shutdown.clone(),
                            ));
                        },
                        Err(e) => tracing::error!(error = %e, "accept failed"),
                    }
                },
            }
        }

        tracing::info!("shutting down");
        let notified = broadcaster.shutdown_all().await?;
        tracing::info!(notified, "shutdown notices sent");

        alert_task.abort();
        connections.shutdown().await;
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("sessions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Generate and broadcast one alert per tick while any session is registered.
async fn alert_loop(
    source: Arc<dyn AlertSource>,
    broadcaster: Broadcaster,
    registry: Arc<SessionRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so alerts start one full
    // interval after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {},
        }

        if registry.is_empty() {
            continue;
        }

        let alert = source.next_alert();
        match broadcaster.broadcast(&alert).await {
            Ok(outcome) => tracing::info!(
                alert_id = alert.alert_id,
                delivered = outcome.delivered,
                evicted = outcome.evicted.len(),
                "alert broadcast"
            ),
            Err(e) => tracing::error!(error = %e, "broadcast failed"),
        }
    }
}

/// One connection from accept to disconnect.
async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    cipher: Arc<CipherSession>,
    credentials: Arc<CredentialStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let session_id = addr.to_string();
    tracing::info!(session = %session_id, "new connection");

    let (mut reader, write_half) = socket.into_split();
    let writer = shared_writer(write_half);

    match run_handshake(&mut reader, &writer, &session_id, &registry, &cipher, &credentials).await {
        Ok(true) => {},
        Ok(false) => {
            tracing::info!(session = %session_id, "connection closed, handshake refused");
            return;
        },
        Err(e) => {
            tracing::info!(session = %session_id, error = %e, "connection closed during handshake");
            return;
        },
    }
    tracing::info!(session = %session_id, active = registry.len(), "session registered");

    if let Err(e) =
        steady_state_loop(&mut reader, &writer, &session_id, &cipher, &mut shutdown).await
    {
        tracing::debug!(session = %session_id, error = %e, "session loop ended");
    }

    registry.deregister(&session_id);
    tracing::info!(session = %session_id, active = registry.len(), "session disconnected");
}

/// Drive the handshake state machine against the socket.
///
/// Returns whether the session reached the active state and was registered.
async fn run_handshake(
    reader: &mut OwnedReadHalf,
    writer: &SharedWriter,
    session_id: &str,
    registry: &SessionRegistry,
    cipher: &CipherSession,
    credentials: &Arc<CredentialStore>,
) -> Result<bool, ServerError> {
    let key_text = cipher
        .key_text()
        .ok_or_else(|| ServerError::Config("no session key installed".to_string()))?;
    let mut handshake = Handshake::new(session_id.to_string(), key_text, Arc::clone(credentials));

    while !handshake.is_finished() {
        let payload = read_frame(reader).await?;
        let text = String::from_utf8_lossy(&payload);

        for action in handshake.on_frame(&text) {
            match action {
                HandshakeAction::SendPlain(message) => {
                    send_frame(writer, message.encode()?.as_bytes()).await?;
                },
                HandshakeAction::SendEncrypted(text) => {
                    let sealed = cipher.encrypt(text.as_bytes())?;
                    send_frame(writer, &sealed).await?;
                },
                HandshakeAction::RegisterSession => {
                    registry.register(session_id, Session::new(Arc::clone(writer)));
                },
                HandshakeAction::Close { reason } => {
                    tracing::info!(session = %session_id, %reason, "handshake closed");
                },
            }
        }
    }

    Ok(handshake.state() == HandshakeState::Active)
}

/// Encrypted-mode receive loop: acknowledgments, heartbeats, free-form text.
///
/// Exits on frame errors, on undecryptable frames, and on shutdown.
async fn steady_state_loop(
    reader: &mut OwnedReadHalf,
    writer: &SharedWriter,
    session_id: &str,
    cipher: &CipherSession,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), ServerError> {
    loop {
        let payload = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            frame = read_frame(reader) => frame?,
        };

        let plaintext = cipher.decrypt(&payload)?;

        match WireMessage::from_payload(&plaintext) {
            Ok(WireMessage::Ack(alert_id)) => {
                tracing::info!(session = %session_id, alert_id, "acknowledgment recorded");
            },
            Ok(WireMessage::Heartbeat) => {
                let reply = cipher.encrypt(WireMessage::HeartbeatOk.encode()?.as_bytes())?;
                send_frame(writer, &reply).await?;
            },
            Ok(WireMessage::Text(text)) => {
                tracing::info!(session = %session_id, message = %text, "message received");
            },
            Ok(other) => {
                tracing::debug!(session = %session_id, message = ?other, "unexpected message ignored");
            },
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "undecodable message ignored");
            },
        }
    }
}

async fn send_frame(writer: &SharedWriter, payload: &[u8]) -> Result<(), FrameError> {
    let mut writer = writer.lock().await;
    write_frame(&mut *writer, payload).await
}
