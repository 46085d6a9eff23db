//! Error types for the signaling relay
//!
//! Defines connection-level errors and the terminal causes attached to a
//! session's cancellation scope. Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Application-level errors
///
/// Returned by the connection handler and the binary's `main`; a handler
/// error ends the TCP connection before any session is created.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol or handshake error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// IO error (bind/accept)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason a session's scope was cancelled
///
/// Only the first cause given to a scope is kept.
#[derive(Debug, Error)]
pub enum CancelCause {
    /// Peer sent a close frame or the stream ended
    #[error("connection closed by peer")]
    Closed,

    /// Socket read or write failed
    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// Peer sent a frame that is not the expected JSON
    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer sent a binary frame; the protocol is JSON text only
    #[error("unexpected binary frame")]
    BinaryFrame,

    /// Viewer deadline expired
    #[error("signaling time limit exceeded")]
    Timeout,

    /// Referenced streamer session no longer accepts messages
    #[error("streamer session has ended")]
    StreamerGone,
}

impl CancelCause {
    /// Classify transport errors that are an ordinary disconnect
    pub fn from_ws_error(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                CancelCause::Closed
            }
            err => CancelCause::Transport(err),
        }
    }

    pub fn is_clean_close(&self) -> bool {
        matches!(self, CancelCause::Closed)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CancelCause::Timeout)
    }
}
