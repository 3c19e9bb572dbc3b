//! Stormcast server binary.

use std::time::Duration;

use clap::Parser;
use stormcast_server::{Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "stormcast-server", version, about = "Encrypted alert broadcast server")]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:8888")]
    bind: String,

    /// Seconds between generated alerts.
    #[arg(long, default_value_t = 10)]
    alert_interval: u64,

    /// Maximum concurrent clients.
    #[arg(long, default_value_t = 10)]
    max_clients: usize,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let config = ServerConfig {
        bind_address: args.bind,
        max_clients: args.max_clients,
        alert_interval: Duration::from_secs(args.alert_interval),
    };

    let server = Server::bind(config).await?;
    tracing::info!(address = %server.local_addr()?, "stormcast server up");
    tracing::info!(key = %server.key_text(), "session key, hand to clients exactly as printed");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    server.run(shutdown_rx).await?;
    Ok(())
}
