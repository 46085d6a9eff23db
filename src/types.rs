//! Basic type definitions for the signaling relay
//!
//! Provides newtype wrappers for type safety:
//! - `ViewerId`: UUID-based unique viewer identifier
//! - `StreamerCode`: 5-character uppercase alphanumeric streamer code

use std::str::FromStr;

use rand::Rng;
use uuid::Uuid;

/// Symbols a streamer code is drawn from
pub const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of characters in a streamer code
pub const CODE_LENGTH: usize = 5;

/// Unique viewer identifier (newtype pattern)
///
/// Wraps a UUID v4. Travels on the wire in its hyphenated string form,
/// both as the `from` of viewer messages and the `to` of streamer messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(pub Uuid);

impl ViewerId {
    /// Create a new random viewer ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ViewerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Streamer code (5-character uppercase alphanumeric)
///
/// Handed to a streamer on connect and typed in by viewers to find it.
/// Each character is sampled independently and uniformly from `CODE_CHARSET`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamerCode(pub String);

impl StreamerCode {
    /// Generate a new random streamer code
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..CODE_LENGTH)
            .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
            .collect();
        Self(code)
    }

    /// Wrap a code taken from a request path, unchanged
    pub fn from_path(code: &str) -> Self {
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
