//! Streamer session
//!
//! Server-side state for one streamer connection and the three tasks that
//! run for it:
//! - read: streamer socket → outbound queue
//! - inbound relay: inbound queue (filled by viewers) → streamer socket
//! - outbound relay: outbound queue → the addressed viewer's socket
//!
//! All three share the session's `CancelScope` and stop when it fires.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connection::{read_json, Connection, WsSource};
use crate::message::{StreamerMessage, ViewerMessage};
use crate::scope::CancelScope;
use crate::server::ViewerRegistry;
use crate::types::StreamerCode;

/// One connected streamer
pub struct Streamer {
    code: StreamerCode,
    conn: Connection,
    /// Viewer → Streamer queue
    inbound: mpsc::Sender<ViewerMessage>,
    scope: CancelScope,
}

impl Streamer {
    /// Create a streamer session writing to `conn`
    ///
    /// `inbound` is the sending side of the queue that `start` later drains.
    pub fn new(
        code: StreamerCode,
        conn: Connection,
        inbound: mpsc::Sender<ViewerMessage>,
        scope: CancelScope,
    ) -> Self {
        Self {
            code,
            conn,
            inbound,
            scope,
        }
    }

    pub fn code(&self) -> &StreamerCode {
        &self.code
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Queue a viewer's message for delivery to this streamer
    ///
    /// Waits for room in the queue. Fails once the inbound relay has stopped.
    pub async fn push_inbound(
        &self,
        msg: ViewerMessage,
    ) -> Result<(), mpsc::error::SendError<ViewerMessage>> {
        self.inbound.send(msg).await
    }

    /// Spawn the read, inbound-relay and outbound-relay tasks
    pub fn start(
        self: &Arc<Self>,
        source: WsSource,
        inbound: mpsc::Receiver<ViewerMessage>,
        viewers: Arc<ViewerRegistry>,
        queue_capacity: usize,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_capacity);

        tokio::spawn(Arc::clone(self).read_loop(source, outbound_tx));
        tokio::spawn(Arc::clone(self).relay_inbound(inbound));
        tokio::spawn(Arc::clone(self).relay_outbound(outbound_rx, viewers));
    }

    /// Read `{to, data}` messages from the streamer and queue them for relay
    async fn read_loop(
        self: Arc<Self>,
        mut source: WsSource,
        outbound: mpsc::Sender<StreamerMessage>,
    ) {
        loop {
            let msg = tokio::select! {
                _ = self.scope.cancelled() => break,
                res = read_json::<StreamerMessage>(&mut source) => match res {
                    Ok(msg) => msg,
                    Err(cause) => {
                        self.scope.cancel(cause);
                        break;
                    }
                },
            };

            tokio::select! {
                _ = self.scope.cancelled() => break,
                res = outbound.send(msg) => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Read task ended for streamer {}", self.code);
    }

    /// Write viewer messages to the streamer's own socket
    async fn relay_inbound(self: Arc<Self>, mut inbound: mpsc::Receiver<ViewerMessage>) {
        loop {
            tokio::select! {
                _ = self.scope.cancelled() => break,
                msg = inbound.recv() => {
                    let Some(msg) = msg else {
                        break;
                    };

                    if let Err(cause) = self.conn.send_json(&msg).await {
                        self.scope.cancel(cause);
                        break;
                    }
                    debug!("Streamer {} received message from {}", self.code, msg.from);
                }
            }
        }
        debug!("Inbound relay ended for streamer {}", self.code);
    }

    /// Deliver streamer messages to the addressed viewers
    ///
    /// A bad or unknown target drops the message. A failed write cancels
    /// only the target viewer; this session keeps running.
    async fn relay_outbound(
        self: Arc<Self>,
        mut outbound: mpsc::Receiver<StreamerMessage>,
        viewers: Arc<ViewerRegistry>,
    ) {
        loop {
            let msg = tokio::select! {
                _ = self.scope.cancelled() => break,
                msg = outbound.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let Some(viewer_id) = msg.target() else {
                info!(
                    "Streamer {}: invalid target viewer id {}",
                    self.code,
                    msg.raw_target()
                );
                continue;
            };

            let Some(viewer) = viewers.get(&viewer_id) else {
                info!("Streamer {}: target viewer {} does not exist", self.code, viewer_id);
                continue;
            };

            tokio::select! {
                _ = self.scope.cancelled() => break,
                _ = viewer.scope().cancelled() => {}
                res = viewer.deliver(msg.payload()) => {
                    match res {
                        Ok(()) => debug!("Streamer {} sent message to {}", self.code, viewer_id),
                        Err(cause) => {
                            viewer.scope().cancel(cause);
                        }
                    }
                }
            }
        }
        debug!("Outbound relay ended for streamer {}", self.code);
    }
}
