//! Message protocol definitions
//!
//! One JSON document per WebSocket frame. The signaling payload (`data`) is
//! never interpreted: it is kept as raw JSON text so viewers and streamers
//! receive exactly the bytes their peer sent.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::types::{StreamerCode, ViewerId};

/// Server → Streamer, sent once right after the streamer connects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMessage {
    pub code: String,
}

impl From<&StreamerCode> for CodeMessage {
    fn from(code: &StreamerCode) -> Self {
        Self {
            code: code.to_string(),
        }
    }
}

/// Viewer → Streamer envelope
///
/// Built by the server around every frame a viewer sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerMessage {
    /// Originating viewer's id in string form
    pub from: String,
    /// Signaling payload
    pub data: Box<RawValue>,
}

impl ViewerMessage {
    pub fn new(from: ViewerId, data: Box<RawValue>) -> Self {
        Self {
            from: from.to_string(),
            data,
        }
    }
}

/// Streamer → Viewer envelope
///
/// Both fields decode leniently: a missing, `null` or non-string `to` is
/// resolved at relay time by `target`, so a bad target only drops the
/// message. A missing `data` is relayed as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerMessage {
    /// Target viewer's id, expected in string form
    #[serde(default)]
    pub to: Option<Value>,
    /// Signaling payload
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl StreamerMessage {
    /// The addressed viewer, if `to` is a well-formed id string
    pub fn target(&self) -> Option<ViewerId> {
        match &self.to {
            Some(Value::String(to)) => to.parse().ok(),
            _ => None,
        }
    }

    /// `to` as it appeared on the wire, for logging
    pub fn raw_target(&self) -> String {
        match &self.to {
            Some(to) => to.to_string(),
            None => "<missing>".to_string(),
        }
    }

    /// Payload text to forward, `null` when absent
    pub fn payload(&self) -> &str {
        self.data.as_deref().map_or("null", RawValue::get)
    }
}
