//! ssemon client library
//!
//! Watches a Server-Sent Events stream: one [`StreamController`] owns at most
//! one connection to `{server}/events`, routes each event by channel and
//! renders it, newest first, into a [`Display`].
//!
//! # Example
//!
//! ```rust,no_run
//! use ssemon_client::{MemoryDisplay, SseClient, StreamController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SseClient::new("http://localhost:8080")?;
//!     let mut controller = StreamController::new(client, MemoryDisplay::new());
//!
//!     controller.start().await;
//!     controller.run_until_idle().await;
//!
//!     println!("{}", controller.display().to_text());
//!     Ok(())
//! }
//! ```
//!
//! # Channels
//!
//! The default [`DispatchTable`] renders `message` and `sensor-data` events
//! and closes the stream after rendering an `end` event. Transport failures
//! (refused connection, non-2xx status, dropped socket, stream closed without
//! `end`) render a single `error` record and leave the controller Idle. There
//! is no automatic reconnection.
//!
//! # Testing
//!
//! The `testing` module provides an in-memory transport and a scripted SSE
//! server:
//!
//! ```rust,ignore
//! use ssemon_client::testing::{SseScript, TestServer};
//!
//! let server = TestServer::start(SseScript::sensor_feed(3).router()).await?;
//! let mut controller = StreamController::new(server.client.clone(), MemoryDisplay::new());
//! ```

mod client;
pub mod controller;
mod error;
pub mod render;
pub mod streaming;
pub mod testing;

pub use client::{SseClient, DEFAULT_CONNECT_TIMEOUT, EVENTS_PATH, HEALTH_PATH};
pub use error::{ClientError, Result};

pub use controller::{ChannelHandler, ControllerState, DispatchTable, StreamController};
pub use render::{Display, MemoryDisplay, RenderedRecord, Renderer};

// Re-export streaming types for convenience
pub use streaming::{Connection, EventTransport, SseEvent, StreamError};
