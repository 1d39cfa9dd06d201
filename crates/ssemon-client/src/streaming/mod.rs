//! SSE (Server-Sent Events) streaming
//!
//! Wire parser, the HTTP-backed [`Connection`] and the [`EventTransport`]
//! seam the controller opens streams through.
//!
//! # Example
//!
//! ```no_run
//! use ssemon_client::SseClient;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SseClient::new("http://localhost:8080")?;
//!
//! let mut conn = client.connect().await?;
//!
//! while let Some(event) = conn.next().await {
//!     let event = event?;
//!     println!("{}: {}", event.event, event.data);
//!     if event.event == "end" {
//!         break;
//!     }
//! }
//!
//! conn.close();
//! # Ok(())
//! # }
//! ```

mod connection;
mod parser;
mod types;

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;

pub use connection::Connection;
pub use parser::SseParser;
pub use types::{SseEvent, StreamError, StreamResult, DEFAULT_CHANNEL};

/// A boxed stream of decoded events; `None` means the transport closed
pub type EventStream = Pin<Box<dyn Stream<Item = StreamResult<SseEvent>> + Send>>;

/// Something that can open an event stream
///
/// Implemented by [`crate::SseClient`] over HTTP and by
/// [`crate::testing::ScriptedTransport`] for offline tests.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open a new stream
    async fn open(&self) -> StreamResult<EventStream>;
}
