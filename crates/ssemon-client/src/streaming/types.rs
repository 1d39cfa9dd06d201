//! Types for SSE streams

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel name used when a block carries no `event:` field
pub const DEFAULT_CHANNEL: &str = "message";

/// A single event decoded from the SSE wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Event channel (`event:` field, `"message"` when absent)
    pub event: String,

    /// Payload, multiple `data:` lines joined with `\n`
    pub data: String,

    /// Last event ID seen on the stream at dispatch time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SseEvent {
    /// Create an event on the default `message` channel
    pub fn message(data: impl Into<String>) -> Self {
        Self::named(DEFAULT_CHANNEL, data)
    }

    /// Create an event on a named channel
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    /// Attach an event ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Encode the event back into wire format (one block, blank-line terminated)
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        if self.event != DEFAULT_CHANNEL {
            out.push_str("event: ");
            out.push_str(&self.event);
            out.push('\n');
        }
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Errors that can occur while opening or reading a stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// HTTP/connection error
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// Stream endpoint could not be resolved
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Server returned an error
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Stream was closed by the server
    #[error("Stream closed")]
    Closed,
}

/// Result type for streaming operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;
