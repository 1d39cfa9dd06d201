//! Stream controller
//!
//! Owns at most one open event stream, routes each incoming event through a
//! [`DispatchTable`] and renders it. The controller is a two-state machine:
//!
//! ```text
//! Idle --start--> Connected
//! Connected --stop | end event | transport error--> Idle
//! Connected --start--> Connected   (no-op)
//! ```
//!
//! A closed stream is never reopened automatically; only `start()` opens a
//! new one.

use std::collections::HashMap;

use futures::StreamExt;
use tracing::{debug, trace, warn};

use crate::render::{Display, Renderer, CONNECTING_PLACEHOLDER};
use crate::streaming::{EventStream, EventTransport, SseEvent, StreamError, DEFAULT_CHANNEL};

/// Channel carrying sensor samples
pub const SENSOR_DATA_CHANNEL: &str = "sensor-data";

/// Channel signalling the logical end of the stream
pub const END_CHANNEL: &str = "end";

/// Type label of the transport error record
pub const ERROR_KIND: &str = "error";

/// Type label of informational records
pub const INFO_KIND: &str = "info";

/// Text of the transport error record; the cause is never shown
pub const TRANSPORT_ERROR_MESSAGE: &str = "connection error or closed";

/// Text of the record rendered by an explicit stop
pub const STOPPED_MESSAGE: &str = "stopped receiving data";

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Connected,
}

/// What to do with an event on a given channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelHandler {
    /// Render the event
    Render,
    /// Render the event, then close the stream
    RenderAndClose,
}

/// Mapping from channel name to handler
///
/// Events on channels without an entry are dropped.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    handlers: HashMap<String, ChannelHandler>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(DEFAULT_CHANNEL, ChannelHandler::Render);
        table.register(SENSOR_DATA_CHANNEL, ChannelHandler::Render);
        table.register(END_CHANNEL, ChannelHandler::RenderAndClose);
        table
    }
}

impl DispatchTable {
    /// Table with no channels at all
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add or replace the handler for a channel
    pub fn register(&mut self, channel: impl Into<String>, handler: ChannelHandler) -> &mut Self {
        self.handlers.insert(channel.into(), handler);
        self
    }

    /// Handler for `channel`, if one is registered
    pub fn lookup(&self, channel: &str) -> Option<ChannelHandler> {
        self.handlers.get(channel).copied()
    }

    /// Registered channel names, sorted
    pub fn channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Drives one event stream into a display
pub struct StreamController<T: EventTransport, D: Display> {
    transport: T,
    renderer: Renderer<D>,
    dispatch: DispatchTable,
    connection: Option<EventStream>,
}

impl<T: EventTransport, D: Display> StreamController<T, D> {
    /// Controller with the default channel table
    pub fn new(transport: T, display: D) -> Self {
        Self::with_dispatch(transport, display, DispatchTable::default())
    }

    pub fn with_dispatch(transport: T, display: D, dispatch: DispatchTable) -> Self {
        Self {
            transport,
            renderer: Renderer::new(display),
            dispatch,
            connection: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.connection.is_some() {
            ControllerState::Connected
        } else {
            ControllerState::Idle
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn display(&self) -> &D {
        self.renderer.display()
    }

    pub fn display_mut(&mut self) -> &mut D {
        self.renderer.display_mut()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the stream unless one is already open
    ///
    /// A failure to open is reported like any transport error: one `error`
    /// record, and the controller stays Idle.
    pub async fn start(&mut self) -> ControllerState {
        if self.connection.is_some() {
            trace!("start ignored, already connected");
            return ControllerState::Connected;
        }

        self.renderer.reset(CONNECTING_PLACEHOLDER);

        match self.transport.open().await {
            Ok(stream) => {
                debug!("Event stream opened");
                self.connection = Some(stream);
            }
            Err(e) => self.on_transport_error(&e),
        }

        self.state()
    }

    /// Close the stream and render a "stopped" record; no-op when Idle
    pub fn stop(&mut self) {
        if let Some(stream) = self.connection.take() {
            drop(stream);
            debug!("Event stream stopped");
            self.renderer.render(INFO_KIND, STOPPED_MESSAGE);
        }
    }

    /// Wait for the next item on the stream and handle it
    ///
    /// Returns immediately when Idle. Cancel-safe: dropping the future before
    /// it completes loses no event.
    pub async fn process_next(&mut self) -> ControllerState {
        let item = match self.connection.as_mut() {
            Some(stream) => stream.next().await,
            None => return ControllerState::Idle,
        };

        match item {
            Some(Ok(event)) => self.dispatch_event(&event),
            Some(Err(e)) => self.on_transport_error(&e),
            None => self.on_transport_error(&StreamError::Closed),
        }

        self.state()
    }

    /// Process events until the controller is Idle again
    pub async fn run_until_idle(&mut self) {
        while self.process_next().await == ControllerState::Connected {}
    }

    /// Route one event through the dispatch table
    pub fn dispatch_event(&mut self, event: &SseEvent) {
        if self.connection.is_none() {
            trace!("Event on closed stream dropped");
            return;
        }

        match self.dispatch.lookup(&event.event) {
            Some(ChannelHandler::Render) => {
                self.renderer.render(&event.event, &event.data);
            }
            Some(ChannelHandler::RenderAndClose) => {
                self.renderer.render(&event.event, &event.data);
                self.close();
            }
            None => {
                trace!("No handler for channel '{}'", event.event);
            }
        }
    }

    fn on_transport_error(&mut self, error: &StreamError) {
        warn!("Event stream error: {}", error);
        self.renderer.render(ERROR_KIND, TRANSPORT_ERROR_MESSAGE);
        self.close();
    }

    fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!("Event stream closed");
        }
    }
}
