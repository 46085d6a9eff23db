//! Screen-sharing Signaling Relay Library
//!
//! A WebSocket relay built with tokio-tungstenite that lets one streamer and
//! any number of viewers exchange the opaque negotiation messages needed to
//! set up a direct peer-to-peer media channel. Payloads are routed by
//! identity and never inspected.
//!
//! # Endpoints
//! - `/stream`: the server sends `{"code": "<5-char code>"}`, then relays
//!   `{"to": "<viewer-id>", "data": ...}` from the streamer and delivers
//!   `{"from": "<viewer-id>", "data": ...}` to it
//! - `/watch/{code}`: every frame from the viewer reaches the streamer as the
//!   `data` of a `from` envelope; the `data` of messages addressed to the
//!   viewer arrives as-is. Unknown codes are closed with reason `NO_STREAMER`
//!
//! # Architecture
//! - `Signaler` owns two registries (code → streamer, id → viewer)
//! - Each streamer session runs three tasks: socket read, inbound relay,
//!   and outbound relay; each viewer session runs one read task
//! - Sessions talk only through `mpsc` queues and a shared `CancelScope`
//! - A failed write to one viewer cancels that viewer alone
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use screenz::{serve, Signaler, SignalerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let signaler = Arc::new(Signaler::new(SignalerConfig::default()));
//!     serve(listener, signaler).await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod scope;
pub mod server;
pub mod streamer;
pub mod types;
pub mod viewer;

// Re-export main types for convenience
pub use config::Config;
pub use connection::{CLOSE_DONE, CLOSE_NO_STREAMER};
pub use error::{AppError, CancelCause};
pub use handler::{handle_connection, Route};
pub use message::{CodeMessage, StreamerMessage, ViewerMessage};
pub use registry::Registry;
pub use scope::CancelScope;
pub use server::{serve, Signaler, SignalerConfig, StreamerRegistry, ViewerRegistry};
pub use streamer::Streamer;
pub use types::{StreamerCode, ViewerId};
pub use viewer::Viewer;
