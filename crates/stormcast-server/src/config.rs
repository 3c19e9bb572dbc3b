//! Server configuration.

use std::time::Duration;

/// Runtime configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to, e.g. `127.0.0.1:8888`.
    pub bind_address: String,
    /// Maximum concurrently registered clients. Connections arriving past the
    /// limit are refused before the handshake.
    pub max_clients: usize,
    /// Interval between generated alerts.
    pub alert_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8888".to_string(),
            max_clients: 10,
            alert_interval: Duration::from_secs(10),
        }
    }
}
