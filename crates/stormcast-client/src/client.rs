//! Connection driver: handshake, then encrypted receive loop.

use std::io;

use stormcast_crypto::{CipherError, CipherSession};
use stormcast_proto::{
    read_frame, write_frame, FrameError, ProtocolError, WireMessage,
};
use thiserror::Error;
use tokio::net::{
    tcp::{OwnedReadHalf, OwnedWriteHalf},
    TcpStream, ToSocketAddrs,
};

use crate::console::{Console, Severity};

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connect failed.
    #[error("connect: {0}")]
    Connect(#[from] io::Error),

    /// Frame-level transport failure.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Cipher failure (bad key text, undecryptable frame).
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Unparseable payload.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server answered the credential frame with `AUTH_FAIL`.
    #[error("server refused the credentials")]
    AuthRefused,

    /// The server sent something other than the expected handshake reply.
    #[error("expected {wanted}, got {got}")]
    UnexpectedMessage {
        /// Reply the protocol calls for at this point.
        wanted: &'static str,
        /// What actually arrived.
        got: String,
    },
}

impl ClientError {
    fn unexpected(wanted: &'static str, got: &WireMessage) -> Self {
        Self::UnexpectedMessage { wanted, got: format!("{got:?}") }
    }
}

/// One connection to the server.
///
/// Lifecycle: [`connect`](Client::connect), [`login`](Client::login),
/// [`confirm_key`](Client::confirm_key), then [`run`](Client::run) (or manual
/// [`next_message`](Client::next_message) calls).
pub struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    cipher: CipherSession,
}

impl Client {
    /// Open a plaintext connection. No frames are exchanged yet.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self { reader, writer, cipher: CipherSession::empty() })
    }

    /// Send the credential frame and wait for the key delivery.
    ///
    /// Returns the key text the server delivered. The connection stays in
    /// plaintext until [`confirm_key`](Client::confirm_key).
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String, ClientError> {
        self.send_plain(&WireMessage::User {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

        match self.read_plain().await? {
            WireMessage::AuthSuccess => {},
            WireMessage::AuthFail => return Err(ClientError::AuthRefused),
            other => return Err(ClientError::unexpected("AUTH_SUCCESS", &other)),
        }

        match self.read_plain().await? {
            WireMessage::EncryptionKey(key_text) => Ok(key_text),
            other => Err(ClientError::unexpected("ENCRYPTION_KEY", &other)),
        }
    }

    /// Install the delivered key, confirm it, and read the encrypted welcome.
    ///
    /// Every frame after the `CIPHER_OK` this sends is encrypted, in both
    /// directions.
    pub async fn confirm_key(&mut self, key_text: &str) -> Result<String, ClientError> {
        self.cipher.install_key(key_text)?;
        self.send_plain(&WireMessage::CipherOk).await?;

        let payload = read_frame(&mut self.reader).await?;
        let welcome = self.cipher.decrypt(&payload)?;
        Ok(String::from_utf8_lossy(&welcome).into_owned())
    }

    /// Receive and decrypt the next message.
    pub async fn next_message(&mut self) -> Result<WireMessage, ClientError> {
        let payload = read_frame(&mut self.reader).await?;
        let plaintext = self.cipher.decrypt(&payload)?;
        Ok(WireMessage::from_payload(&plaintext)?)
    }

    /// Encrypted liveness probe.
    pub async fn heartbeat(&mut self) -> Result<(), ClientError> {
        self.send_encrypted(&WireMessage::Heartbeat).await?;
        match self.next_message().await? {
            WireMessage::HeartbeatOk => Ok(()),
            other => Err(ClientError::unexpected("HEARTBEAT_OK", &other)),
        }
    }

    /// Receive loop: alerts are appended to `console` and acknowledged,
    /// `SERVER_SHUTDOWN` and connection loss end the loop.
    pub async fn run(&mut self, console: &dyn Console) -> Result<(), ClientError> {
        loop {
            let message = match self.next_message().await {
                Ok(message) => message,
                Err(ClientError::Frame(FrameError::ShortRead { .. })) => {
                    console.append("Connection lost!", Severity::Error);
                    return Ok(());
                },
                Err(e) => return Err(e),
            };

            match message {
                WireMessage::Alert(alert) => {
                    console.append(
                        &format!(
                            "[{}] {} (Time: {})",
                            alert.priority, alert.message, alert.timestamp
                        ),
                        alert.priority.into(),
                    );
                    self.send_encrypted(&WireMessage::Ack(alert.alert_id)).await?;
                },
                WireMessage::ServerShutdown => {
                    console.append("Server is shutting down.", Severity::Info);
                    return Ok(());
                },
                WireMessage::Text(text) => console.append(&text, Severity::Info),
                other => {
                    tracing::debug!(message = ?other, "unexpected message ignored");
                },
            }
        }
    }

    async fn send_plain(&mut self, message: &WireMessage) -> Result<(), ClientError> {
        write_frame(&mut self.writer, message.encode()?.as_bytes()).await?;
        Ok(())
    }

    async fn send_encrypted(&mut self, message: &WireMessage) -> Result<(), ClientError> {
        let sealed = self.cipher.encrypt(message.encode()?.as_bytes())?;
        write_frame(&mut self.writer, &sealed).await?;
        Ok(())
    }

    async fn read_plain(&mut self) -> Result<WireMessage, ClientError> {
        let payload = read_frame(&mut self.reader).await?;
        Ok(WireMessage::from_payload(&payload)?)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("encrypted", &self.cipher.has_key()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    /// Scripted server side of a successful handshake.
    async fn scripted_server(listener: TcpListener, key_text: String) {
        let (mut socket, _) = listener.accept().await.expect("accept");

        let payload = read_frame(&mut socket).await.expect("credential frame");
        assert_eq!(payload, b"USER:admin:admin123");

        write_frame(&mut socket, b"AUTH_SUCCESS").await.expect("auth reply");
        write_frame(&mut socket, format!("ENCRYPTION_KEY:{key_text}").as_bytes())
            .await
            .expect("key frame");

        let payload = read_frame(&mut socket).await.expect("confirmation frame");
        assert_eq!(payload, b"CIPHER_OK");

        let cipher = CipherSession::from_key_text(&key_text).expect("key");
        let welcome = cipher.encrypt(b"Welcome! You are connected to the server.").expect("seal");
        write_frame(&mut socket, &welcome).await.expect("welcome frame");
    }

    #[tokio::test]
    async fn two_step_handshake_reaches_encrypted_mode() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let key_text = CipherSession::generate().key_text().expect("key text");
        let server = tokio::spawn(scripted_server(listener, key_text.clone()));

        let mut client = Client::connect(addr).await.expect("connect");
        let delivered = client.login("admin", "admin123").await.expect("login");
        assert_eq!(delivered, key_text);

        let welcome = client.confirm_key(&delivered).await.expect("confirm");
        assert_eq!(welcome, "Welcome! You are connected to the server.");

        server.await.expect("server task");
    }

    #[tokio::test]
    async fn auth_fail_surfaces_as_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            read_frame(&mut socket).await.expect("credential frame");
            write_frame(&mut socket, b"AUTH_FAIL").await.expect("refusal");
        });

        let mut client = Client::connect(addr).await.expect("connect");
        let err = client.login("admin", "wrong").await.expect_err("must refuse");
        assert!(matches!(err, ClientError::AuthRefused));

        server.await.expect("server task");
    }
}
