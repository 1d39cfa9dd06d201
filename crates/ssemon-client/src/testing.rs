//! Test utilities for ssemon-client
//!
//! - [`ScriptedTransport`]: an in-memory [`EventTransport`] for driving the
//!   controller without a network.
//! - [`SseScript`] + [`TestServer`]: a real HTTP server on an ephemeral port
//!   that replays a scripted SSE body on `/events`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use tokio::net::TcpListener;

use crate::client::{EVENTS_PATH, HEALTH_PATH};
use crate::streaming::{EventStream, EventTransport, SseEvent, StreamError, StreamResult};
use crate::{Result, SseClient};

// =============================================================================
// In-memory transport
// =============================================================================

/// What a scripted stream does after its last event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptEnd {
    /// Stream ends (`None`)
    Close,
    /// Stream yields one error
    Fail,
    /// Stream never yields again
    HoldOpen,
}

/// Transport replaying the same event script on every `open()`
#[derive(Debug)]
pub struct ScriptedTransport {
    events: Vec<SseEvent>,
    end: ScriptEnd,
    refuse: bool,
    opened: AtomicUsize,
}

impl ScriptedTransport {
    /// Transport whose streams yield `events` then close
    pub fn new(events: Vec<SseEvent>) -> Self {
        Self {
            events,
            end: ScriptEnd::Close,
            refuse: false,
            opened: AtomicUsize::new(0),
        }
    }

    /// Keep streams open after the last event
    pub fn hold_open(mut self) -> Self {
        self.end = ScriptEnd::HoldOpen;
        self
    }

    /// Yield a transport error after the last event
    pub fn fail_after_script(mut self) -> Self {
        self.end = ScriptEnd::Fail;
        self
    }

    /// Fail every `open()` call
    pub fn refuse_open(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Number of successful `open()` calls
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn open(&self) -> StreamResult<EventStream> {
        if self.refuse {
            return Err(StreamError::Server {
                status: 503,
                message: "scripted refusal".into(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        let events = stream::iter(self.events.clone().into_iter().map(Ok));
        let tail: EventStream = match self.end {
            ScriptEnd::Close => Box::pin(stream::empty::<StreamResult<SseEvent>>()),
            ScriptEnd::Fail => Box::pin(stream::once(async {
                Err::<SseEvent, _>(StreamError::Closed)
            })),
            ScriptEnd::HoldOpen => Box::pin(stream::pending::<StreamResult<SseEvent>>()),
        };

        Ok(Box::pin(events.chain(tail)))
    }
}

// =============================================================================
// HTTP test server
// =============================================================================

#[derive(Debug, Clone)]
enum ScriptStep {
    Chunk(String),
    Delay(Duration),
}

/// A scripted SSE response body, served by [`SseScript::router`]
#[derive(Debug, Clone)]
pub struct SseScript {
    steps: Vec<ScriptStep>,
    status: StatusCode,
    hold_open: bool,
    connections: Arc<AtomicUsize>,
}

impl Default for SseScript {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            status: StatusCode::OK,
            hold_open: false,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SseScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send one event
    pub fn event(mut self, event: SseEvent) -> Self {
        self.steps.push(ScriptStep::Chunk(event.to_wire()));
        self
    }

    /// Send raw wire text as one chunk
    pub fn raw(mut self, chunk: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Chunk(chunk.into()));
        self
    }

    /// Pause before the next step
    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Delay(duration));
        self
    }

    /// Keep the response open after the last step
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Answer `/events` with `status` and no stream
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Number of requests `/events` has received
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// `count` sensor samples with heartbeat comments, then an `end` event
    pub fn sensor_feed(count: u32) -> Self {
        let mut script = Self::new();
        for n in 1..=count {
            let payload = serde_json::json!({
                "temperature": 20 + (n % 16),
                "humidity": 30 + (n % 51),
                "message": format!("Data #{}", n),
            });
            script = script.raw(format!(
                "event: sensor-data\ndata: {}\n: heartbeat\n\n",
                payload
            ));
        }
        script.event(SseEvent::named("end", "{\"status\": \"finished\"}"))
    }

    /// Router serving this script on `/events` plus a `/health` probe
    pub fn router(&self) -> Router {
        Router::new()
            .route(EVENTS_PATH, get(serve_script))
            .route(HEALTH_PATH, get(health))
            .with_state(self.clone())
    }
}

async fn health() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        "{\"status\": \"ok\"}",
    )
}

async fn serve_script(State(script): State<SseScript>) -> Response {
    script.connections.fetch_add(1, Ordering::SeqCst);

    if !script.status.is_success() {
        return (script.status, "stream unavailable").into_response();
    }

    let steps = script.steps;
    let hold_open = script.hold_open;
    let body = async_stream::stream! {
        for step in steps {
            match step {
                ScriptStep::Chunk(text) => yield Ok::<Bytes, Infallible>(Bytes::from(text)),
                ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
            }
        }
        if hold_open {
            futures::future::pending::<()>().await;
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: SseClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Start serving `router` on an ephemeral local port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ssemon_client::testing::{SseScript, TestServer};
    ///
    /// let script = SseScript::sensor_feed(3);
    /// let server = TestServer::start(script.router()).await?;
    /// let conn = server.client.connect().await?;
    /// ```
    pub async fn start(router: Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(2)).await
    }

    /// Start a test server with a custom client connect timeout
    pub async fn start_with_timeout(router: Router, connect_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let base_url = format!("http://{}", addr);
        let client = SseClient::with_connect_timeout(&base_url, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &SseClient {
        &self.client
    }

    /// Stop the server and wait for it to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
