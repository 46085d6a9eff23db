//! Viewer session
//!
//! Server-side state for one viewer connection. Its single task reads the
//! viewer's frames and queues them on the streamer's inbound queue; frames
//! for the viewer are written by the streamer's outbound relay via `deliver`.

use std::sync::{Arc, Weak};

use serde_json::value::RawValue;
use tracing::debug;

use crate::connection::{read_json, Connection, WsSource};
use crate::error::CancelCause;
use crate::message::ViewerMessage;
use crate::scope::CancelScope;
use crate::streamer::Streamer;
use crate::types::{StreamerCode, ViewerId};

/// One connected viewer
pub struct Viewer {
    id: ViewerId,
    conn: Connection,
    /// Streamer this viewer watches. Set once; does not keep the session alive.
    streamer: Weak<Streamer>,
    /// Code the viewer joined with, for logging
    code: StreamerCode,
    scope: CancelScope,
}

impl Viewer {
    pub fn new(id: ViewerId, conn: Connection, streamer: &Arc<Streamer>, scope: CancelScope) -> Self {
        Self {
            id,
            conn,
            streamer: Arc::downgrade(streamer),
            code: streamer.code().clone(),
            scope,
        }
    }

    pub fn id(&self) -> ViewerId {
        self.id
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn scope(&self) -> &CancelScope {
        &self.scope
    }

    /// Write a streamer's payload to this viewer, without any envelope
    pub async fn deliver(&self, data: &str) -> Result<(), CancelCause> {
        self.conn.send_text(data.to_owned()).await
    }

    /// Spawn the read task
    pub fn start(self: &Arc<Self>, source: WsSource) {
        tokio::spawn(Arc::clone(self).read_loop(source));
    }

    /// Wrap each viewer frame as `{from, data}` and queue it for the streamer
    async fn read_loop(self: Arc<Self>, mut source: WsSource) {
        loop {
            let data = tokio::select! {
                _ = self.scope.cancelled() => break,
                res = read_json::<Box<RawValue>>(&mut source) => match res {
                    Ok(data) => data,
                    Err(cause) => {
                        self.scope.cancel(cause);
                        break;
                    }
                },
            };

            let Some(streamer) = self.streamer.upgrade() else {
                self.scope.cancel(CancelCause::StreamerGone);
                break;
            };

            let msg = ViewerMessage::new(self.id, data);
            tokio::select! {
                _ = self.scope.cancelled() => break,
                res = streamer.push_inbound(msg) => {
                    if res.is_err() {
                        self.scope.cancel(CancelCause::StreamerGone);
                        break;
                    }
                }
            }
            debug!("Viewer {} sent message to streamer {}", self.id, self.code);
        }
        debug!("Read task ended for viewer {}", self.id);
    }
}
