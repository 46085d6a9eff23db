//! Command-line configuration

use std::time::Duration;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::server::SignalerConfig;

#[derive(Debug, Parser)]
#[command(name = "screenz")]
#[command(about = "WebSocket signaling relay for browser screen sharing", long_about = None)]
pub struct Config {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to run the server on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error, off); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,

    /// Seconds a viewer connection may stay open
    #[arg(long, default_value_t = 60)]
    pub viewer_timeout: u64,

    /// Capacity of each streamer's message queues
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_capacity: u64,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn signaler_config(&self) -> SignalerConfig {
        SignalerConfig {
            viewer_deadline: Duration::from_secs(self.viewer_timeout),
            queue_capacity: self.queue_capacity as usize,
        }
    }
}
