//! Live SSE connection

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::parser::SseParser;
use super::types::{SseEvent, StreamError, StreamResult};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// An open SSE connection
///
/// Implements `Stream<Item = Result<SseEvent, StreamError>>`. The stream
/// yields `None` once the server closes the response body.
///
/// # Lifecycle
///
/// - Created via `SseClient::connect()`
/// - Events are consumed via `next()` or the `Stream` trait
/// - Call `close()` or drop it; either releases the HTTP connection
pub struct Connection {
    /// URL the stream was opened on
    url: Url,

    /// The underlying byte stream from reqwest
    byte_stream: ByteStream,

    /// SSE parser
    parser: SseParser,

    /// Parsed events not yet handed out
    pending: VecDeque<SseEvent>,

    /// Set once the byte stream has returned `None` or an error
    finished: bool,
}

impl Connection {
    /// Open a stream on `url`
    pub(crate) async fn open(http_client: &Client, url: Url) -> StreamResult<Self> {
        debug!("Connecting to SSE stream: {}", url);

        let response = http_client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StreamError::Server { status, message });
        }

        Ok(Self::from_byte_stream(url, Box::pin(response.bytes_stream())))
    }

    fn from_byte_stream(url: Url, byte_stream: ByteStream) -> Self {
        Self {
            url,
            byte_stream,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// URL this connection reads from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Last event ID received on this connection
    pub fn last_event_id(&self) -> Option<&str> {
        self.parser.last_event_id()
    }

    /// Close the connection
    pub fn close(self) {
        debug!("Closing SSE stream: {}", self.url);
    }
}

impl Stream for Connection {
    type Item = StreamResult<SseEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            match this.byte_stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.parser.feed(bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(StreamError::Connection(e))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn connection_from(chunks: Vec<&'static [u8]>) -> Connection {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(Bytes::from_static(c))),
        );
        let url = Url::parse("http://localhost/events").unwrap();
        Connection::from_byte_stream(url, Box::pin(stream))
    }

    #[tokio::test]
    async fn test_events_across_chunks() {
        let mut conn = connection_from(vec![
            b"event: sensor-data\nda",
            b"ta: 1\n\ndata: 2\n",
            b"\n",
        ]);

        let first = conn.next().await.unwrap().unwrap();
        assert_eq!(first, SseEvent::named("sensor-data", "1"));

        let second = conn.next().await.unwrap().unwrap();
        assert_eq!(second, SseEvent::message("2"));

        assert!(conn.next().await.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_trailing_block_dropped_at_eof() {
        let mut conn = connection_from(vec![b"data: never finished\n"]);

        assert!(conn.next().await.is_none());
    }

    #[tokio::test]
    async fn test_last_event_id_tracked() {
        let mut conn = connection_from(vec![b"id: 42\ndata: x\n\n"]);

        conn.next().await.unwrap().unwrap();
        assert_eq!(conn.last_event_id(), Some("42"));
    }
}
