//! SSE (Server-Sent Events) parser
//!
//! Turns the SSE wire format into [`SseEvent`]s. Input may arrive in arbitrary
//! chunks; incomplete lines are buffered until their newline shows up.

use bytes::Bytes;
use tracing::trace;

use super::types::{SseEvent, DEFAULT_CHANNEL};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// SSE parser state
#[derive(Debug, Default)]
pub struct SseParser {
    /// Buffer for incomplete lines
    buffer: Vec<u8>,
    /// Current event data being accumulated
    data_buffer: String,
    /// Whether any `data` field was seen for the current event
    has_data: bool,
    /// Current event type (if any)
    event_type: Option<String>,
    /// Last event ID (persists across events)
    last_id: Option<String>,
    /// Whether the start of the stream has been checked for a BOM
    started: bool,
    /// Last line ended in `\r`; a following `\n` belongs to it
    skip_lf: bool,
}

impl SseParser {
    /// Create a new SSE parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Last event ID seen on this stream
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// Feed bytes into the parser and extract any complete events
    pub fn feed(&mut self, bytes: Bytes) -> Vec<SseEvent> {
        let mut events = Vec::new();

        self.buffer.extend_from_slice(&bytes);

        if !self.started {
            // Wait until we can tell whether the stream opens with a BOM
            if self.buffer.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(&self.buffer) {
                return events;
            }
            if self.buffer.starts_with(UTF8_BOM) {
                self.buffer.drain(..UTF8_BOM.len());
            }
            self.started = true;
        }

        loop {
            if self.skip_lf {
                match self.buffer.first() {
                    Some(b'\n') => {
                        self.buffer.remove(0);
                        self.skip_lf = false;
                    }
                    Some(_) => self.skip_lf = false,
                    None => break,
                }
            }

            // Lines end in \n, \r or \r\n
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r') else {
                break;
            };

            let raw = self.buffer.drain(..=pos).collect::<Vec<_>>();
            let Some((&terminator, line)) = raw.split_last() else {
                break;
            };
            self.skip_lf = terminator == b'\r';

            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Process a single line of SSE data
    fn process_line(&mut self, line: &[u8]) -> Option<SseEvent> {
        // Empty line signals end of event
        if line.is_empty() {
            return self.dispatch_event();
        }

        // Comment line (keepalive)
        if line.starts_with(b":") {
            trace!("SSE keepalive/comment");
            return None;
        }

        let line_str = String::from_utf8_lossy(line);

        // Split on first colon
        let (field, value) = match line_str.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (&*line_str, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data_buffer.push('\n');
                }
                self.data_buffer.push_str(value);
                self.has_data = true;
            }
            "event" => {
                self.event_type = Some(value.to_string());
            }
            "id" => {
                if value.contains('\0') {
                    trace!("SSE id with NUL ignored");
                } else {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                // No reconnection, so the retry hint is irrelevant
                trace!("SSE retry: {}", value);
            }
            _ => {
                trace!("SSE unknown field: {}", field);
            }
        }

        None
    }

    /// Dispatch the accumulated event
    fn dispatch_event(&mut self) -> Option<SseEvent> {
        let event_type = self.event_type.take();

        if !self.has_data {
            return None;
        }
        self.has_data = false;

        let event = event_type
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data_buffer),
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(parser: &mut SseParser, input: &'static str) -> Vec<SseEvent> {
        parser.feed(Bytes::from_static(input.as_bytes()))
    }

    #[test]
    fn test_parse_simple_event() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "data: {\"temp\":21.5}\n\n");

        assert_eq!(events, vec![SseEvent::message("{\"temp\":21.5}")]);
    }

    #[test]
    fn test_parse_named_event() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "event: sensor-data\ndata: {\"a\":1}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "sensor-data");
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_event_type_resets_between_events() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "event: end\ndata: x\n\ndata: y\n\n");

        assert_eq!(events[0].event, "end");
        assert_eq!(events[1].event, "message");
    }

    #[test]
    fn test_parse_multiple_events() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "data: 1\n\ndata: 2\n\ndata: 3\n\n");

        assert_eq!(events.len(), 3);
        assert_eq!(events[2].data, "3");
    }

    #[test]
    fn test_parse_chunked_data() {
        let mut parser = SseParser::new();

        let events1 = feed_str(&mut parser, "event: sensor-da");
        assert!(events1.is_empty());

        let events2 = feed_str(&mut parser, "ta\r\ndata: {\"x\":");
        assert!(events2.is_empty());

        let events3 = feed_str(&mut parser, "42}\r\n\r\n");
        assert_eq!(events3, vec![SseEvent::named("sensor-data", "{\"x\":42}")]);
    }

    #[test]
    fn test_bare_cr_line_endings() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "event: sensor-data\rdata: a\rdata: b\r\rdata: c\r\r");

        assert_eq!(
            events,
            vec![
                SseEvent::named("sensor-data", "a\nb"),
                SseEvent::message("c"),
            ]
        );
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut parser = SseParser::new();

        assert!(feed_str(&mut parser, "data: x\r").is_empty());
        // the \n completes the \r\n pair and must not count as a blank line
        assert!(feed_str(&mut parser, "\n").is_empty());
        let events = feed_str(&mut parser, "\r\n");

        assert_eq!(events, vec![SseEvent::message("x")]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "data: first\ndata: second\ndata:third\n\n");

        assert_eq!(events[0].data, "first\nsecond\nthird");
    }

    #[test]
    fn test_ignore_comments() {
        let mut parser = SseParser::new();

        let input = "event: sensor-data\ndata: {\"temperature\": 21}\n: heartbeat\n\n";
        let events = feed_str(&mut parser, input);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "sensor-data");
    }

    #[test]
    fn test_block_without_data_is_not_dispatched() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "event: end\n\ndata: after\n\n");

        // the dangling event type must not leak into the next block
        assert_eq!(events, vec![SseEvent::message("after")]);
    }

    #[test]
    fn test_empty_data_line_dispatches_empty_payload() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "event: end\ndata\n\n");

        assert_eq!(events, vec![SseEvent::named("end", "")]);
    }

    #[test]
    fn test_last_event_id_persists() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "id: 5\ndata: a\n\ndata: b\n\n");

        assert_eq!(events[0].id.as_deref(), Some("5"));
        assert_eq!(events[1].id.as_deref(), Some("5"));
        assert_eq!(parser.last_event_id(), Some("5"));
    }

    #[test]
    fn test_leading_bom_skipped() {
        let mut parser = SseParser::new();

        assert!(parser.feed(Bytes::from_static(b"\xEF\xBB")).is_empty());
        let events = parser.feed(Bytes::from_static(b"\xBFdata: ok\n\n"));

        assert_eq!(events, vec![SseEvent::message("ok")]);
    }

    #[test]
    fn test_invalid_utf8_decoded_lossily() {
        let mut parser = SseParser::new();

        let events = parser.feed(Bytes::from_static(b"data: a\xFFb\n\n"));

        assert_eq!(events[0].data, "a\u{FFFD}b");
    }

    #[test]
    fn test_retry_and_unknown_fields_ignored() {
        let mut parser = SseParser::new();

        let events = feed_str(&mut parser, "retry: 3000\nfoo: bar\ndata: x\n\n");

        assert_eq!(events, vec![SseEvent::message("x")]);
    }
}
