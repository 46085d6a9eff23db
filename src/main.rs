//! Screen-sharing Signaling Relay - Entry Point
//!
//! Parses flags, starts the TCP listener and accepts connections.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use screenz::{serve, AppError, Config, Signaler};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::parse();

    // RUST_LOG overrides --log-level when set
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("screenz={}", config.log_level))),
        )
        .init();

    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("Signaling relay listening on {}", listener.local_addr()?);

    let signaler = Arc::new(Signaler::new(config.signaler_config()));
    serve(listener, signaler).await;

    Ok(())
}
