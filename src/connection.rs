//! WebSocket connection halves
//!
//! A session's socket is split once at accept time. The read half goes to
//! the session's read task; the write half lives in a `Connection` so that
//! relay tasks and cleanup actions can all write to it.

use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::error::CancelCause;

/// Close reason sent on graceful teardown
pub const CLOSE_DONE: &str = "Done";

/// Close reason sent to a viewer whose code matches no streamer
pub const CLOSE_NO_STREAMER: &str = "NO_STREAMER";

/// Upper bound on sending a close frame to a peer that is not reading
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type WsSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Read half of a session's socket
pub type WsSource = BoxStream<'static, Result<Message, tungstenite::Error>>;

/// Write half of a session's socket
pub struct Connection {
    sink: Mutex<WsSink>,
}

impl Connection {
    /// Split an accepted WebSocket into a shared writer and its read half
    pub fn split<S>(ws: WebSocketStream<S>) -> (Self, WsSource)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, source) = ws.split();
        let sink: WsSink = Box::pin(sink);
        let conn = Self {
            sink: Mutex::new(sink),
        };
        (conn, source.boxed())
    }

    /// Send `value` as one JSON text frame
    pub async fn send_json<T: Serialize>(&self, value: &T) -> Result<(), CancelCause> {
        let json = serde_json::to_string(value)?;
        self.send_text(json).await
    }

    /// Send an already-encoded text frame
    pub async fn send_text(&self, text: String) -> Result<(), CancelCause> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(CancelCause::from_ws_error)
    }

    /// Send a normal-closure close frame carrying `reason`
    ///
    /// Errors are ignored: the peer may already be gone. Gives up after
    /// `CLOSE_TIMEOUT`.
    pub async fn close(&self, reason: &'static str) {
        self.close_within(reason, CLOSE_TIMEOUT).await
    }

    /// `close`, giving up once `limit` has elapsed
    ///
    /// A peer that stopped reading leaves the writer stuck on a full
    /// socket; waiting on the lock counts toward `limit` too.
    pub async fn close_within(&self, reason: &'static str, limit: Duration) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.into(),
        };

        let closing = async {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!("Close frame not sent ({}): {}", reason, e);
            }
            let _ = sink.close().await;
        };

        if tokio::time::timeout(limit, closing).await.is_err() {
            debug!("Close ({}) abandoned after {:?}", reason, limit);
        }
    }
}

/// Read the next data frame and decode it as JSON
///
/// Control frames are skipped. A close frame or the end of the stream is
/// reported as `CancelCause::Closed`; binary frames are not part of the
/// protocol and fail with `CancelCause::BinaryFrame`.
pub async fn read_json<T: DeserializeOwned>(source: &mut WsSource) -> Result<T, CancelCause> {
    loop {
        let message = match source.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(CancelCause::from_ws_error(e)),
            None => return Err(CancelCause::Closed),
        };

        match message {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Binary(_) => return Err(CancelCause::BinaryFrame),
            Message::Close(_) => return Err(CancelCause::Closed),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }
    }
}

/// Keep reading until the peer finishes the close handshake or `grace` expires
pub async fn drain(source: &mut WsSource, grace: Duration) {
    let _ = tokio::time::timeout(grace, async {
        while let Some(Ok(_)) = source.next().await {}
    })
    .await;
}
