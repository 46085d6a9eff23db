//! WebSocket connection handler
//!
//! Performs the WebSocket handshake for one TCP connection, picks the
//! endpoint from the request path, and hands the socket to the `Signaler`.

use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info};

use crate::error::AppError;
use crate::server::Signaler;
use crate::types::StreamerCode;

/// Endpoint selected by the request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/stream`
    Stream,
    /// `/watch/{code}`
    Watch(StreamerCode),
}

impl Route {
    /// Match a request path against the two signaling endpoints
    pub fn parse(path: &str) -> Option<Self> {
        if path == "/stream" {
            return Some(Route::Stream);
        }

        let code = path.strip_prefix("/watch/")?;
        if code.is_empty() || code.contains('/') {
            return None;
        }
        Some(Route::Watch(StreamerCode::from_path(code)))
    }
}

/// Handle a new TCP connection
///
/// Requests for any other path are refused with 404 during the handshake.
/// Connections that never send a WebSocket upgrade request (plain HTTP,
/// probes, early disconnects) are logged and dropped without an error.
pub async fn handle_connection(
    stream: TcpStream,
    signaler: Arc<Signaler>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let started = Instant::now();
    let mut path = String::new();
    let mut route = None;

    let callback = |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        route = Route::parse(&path);
        match route {
            Some(_) => Ok(resp),
            None => Err(not_found()),
        }
    };
    let handshake = tokio_tungstenite::accept_hdr_async(stream, callback).await;

    let ws_stream = match handshake {
        Ok(ws) => ws,
        Err(e) if !path.is_empty() && route.is_none() => {
            info!("Rejected {} from {}: no such endpoint", path, peer_addr);
            debug!("Handshake refused: {}", e);
            return Ok(());
        }
        Err(e) if route.is_none() => {
            info!("Refused non-WebSocket request from {}: {}", peer_addr, e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    info!("Upgraded {} for {} in {:?}", path, peer_addr, started.elapsed());

    match route {
        Some(Route::Stream) => {
            signaler.accept_streamer(ws_stream).await;
        }
        Some(Route::Watch(code)) => {
            signaler.accept_viewer(ws_stream, &code).await;
        }
        None => {}
    }

    Ok(())
}

fn not_found() -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some("Not Found".to_string()));
    *resp.status_mut() = StatusCode::NOT_FOUND;
    resp
}
