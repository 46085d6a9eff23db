//! Signaler: the coordinator between streamers and viewers
//!
//! Owns both registries and wires each accepted WebSocket into a session.
//! Also provides `serve`, the TCP accept loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info};

use crate::connection::{drain, Connection, CLOSE_DONE, CLOSE_NO_STREAMER};
use crate::error::CancelCause;
use crate::handler::handle_connection;
use crate::message::CodeMessage;
use crate::registry::Registry;
use crate::scope::CancelScope;
use crate::streamer::Streamer;
use crate::types::{StreamerCode, ViewerId};
use crate::viewer::Viewer;

/// Streamer sessions by code
pub type StreamerRegistry = Registry<StreamerCode, Arc<Streamer>>;

/// Viewer sessions by id
pub type ViewerRegistry = Registry<ViewerId, Arc<Viewer>>;

/// Default lifetime of a viewer connection
pub const DEFAULT_VIEWER_DEADLINE: Duration = Duration::from_secs(60);

/// Default capacity of each session queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// How long a rejected viewer gets to acknowledge the close frame
const REJECT_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Session tuning
#[derive(Debug, Clone)]
pub struct SignalerConfig {
    /// Absolute deadline for each viewer connection, counted from accept
    pub viewer_deadline: Duration,
    /// Capacity of the inbound and outbound queues of every streamer
    pub queue_capacity: usize,
}

impl Default for SignalerConfig {
    fn default() -> Self {
        Self {
            viewer_deadline: DEFAULT_VIEWER_DEADLINE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Coordinates signaling between streamers and viewers
pub struct Signaler {
    streamers: Arc<StreamerRegistry>,
    viewers: Arc<ViewerRegistry>,
    config: SignalerConfig,
}

impl Signaler {
    /// Create a signaler with empty registries
    pub fn new(config: SignalerConfig) -> Self {
        Self {
            streamers: Arc::new(Registry::new()),
            viewers: Arc::new(Registry::new()),
            config,
        }
    }

    pub fn streamers(&self) -> &StreamerRegistry {
        &self.streamers
    }

    pub fn viewers(&self) -> &ViewerRegistry {
        &self.viewers
    }

    /// Register a new streamer connection and start its tasks
    ///
    /// The streamer is sent its code before anything else. The session lives
    /// until its socket fails or closes; the code is then released.
    pub async fn accept_streamer<S>(&self, ws: WebSocketStream<S>) -> StreamerCode
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (conn, source) = Connection::split(ws);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.queue_capacity);
        let scope = CancelScope::new();

        let (code, streamer) = self.streamers.insert_fresh(StreamerCode::generate, |code| {
            Arc::new(Streamer::new(code.clone(), conn, inbound_tx, scope.clone()))
        });

        let streamers = Arc::clone(&self.streamers);
        let session = Arc::clone(&streamer);
        scope.after_cancel(move |_| async move {
            streamers.delete(session.code());
            session.conn().close(CLOSE_DONE).await;
        });

        let logged = code.clone();
        scope.after_cancel(move |scope| async move {
            match scope.cause() {
                Some(cause) if cause.is_clean_close() => {
                    info!("Streamer {} disconnected", logged);
                }
                Some(cause) => error!("Streamer {} session closed: {}", logged, cause),
                None => {}
            }
        });

        if let Err(cause) = streamer.conn().send_json(&CodeMessage::from(&code)).await {
            scope.cancel(cause);
            return code;
        }

        streamer.start(
            source,
            inbound_rx,
            Arc::clone(&self.viewers),
            self.config.queue_capacity,
        );

        info!("Streamer {} connected", code);
        code
    }

    /// Attach a viewer to the streamer registered under `code`
    ///
    /// Unknown codes get an immediate close with reason `NO_STREAMER` and no
    /// state is created. Otherwise returns the new viewer's id.
    pub async fn accept_viewer<S>(
        &self,
        ws: WebSocketStream<S>,
        code: &StreamerCode,
    ) -> Option<ViewerId>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = ViewerId::new();
        let (conn, mut source) = Connection::split(ws);

        let Some(streamer) = self.streamers.get(code) else {
            info!("Viewer {} rejected: no streamer with code {}", id, code);
            conn.close(CLOSE_NO_STREAMER).await;
            drain(&mut source, REJECT_CLOSE_GRACE).await;
            return None;
        };

        let scope = CancelScope::with_deadline(self.config.viewer_deadline);
        let viewer = Arc::new(Viewer::new(id, conn, &streamer, scope.clone()));
        self.viewers.set(id, Arc::clone(&viewer));

        let viewers = Arc::clone(&self.viewers);
        let session = Arc::clone(&viewer);
        scope.after_cancel(move |_| async move {
            viewers.delete(&session.id());
            session.conn().close(CLOSE_DONE).await;
        });

        scope.after_cancel(move |scope| async move {
            match scope.cause() {
                Some(cause) if cause.is_clean_close() => {
                    info!("Viewer {} released connection", id);
                }
                Some(cause) if cause.is_timeout() => info!("Viewer {} timed out", id),
                Some(CancelCause::StreamerGone) => {
                    info!("Viewer {} dropped: streamer has gone away", id);
                }
                Some(cause) => error!("Viewer {} session closed: {}", id, cause),
                None => {}
            }
        });

        viewer.start(source);

        info!("Viewer {} connected to streamer {}", id, code);
        Some(id)
    }
}

/// Accept TCP connections forever, handling each on its own task
pub async fn serve(listener: TcpListener, signaler: Arc<Signaler>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New connection from {}", addr);
                let signaler = Arc::clone(&signaler);

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, signaler).await {
                        error!("Connection handler error for {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
