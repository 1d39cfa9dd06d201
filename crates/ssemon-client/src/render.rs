//! Record rendering and display surfaces
//!
//! A [`Renderer`] turns `(type, raw payload)` pairs into [`RenderedRecord`]s
//! and prepends them to a [`Display`]. The display is the only place records
//! are kept; nothing else holds on to them once rendered.

use std::collections::VecDeque;
use std::fmt;

use chrono::{Local, NaiveTime};
use serde::Serialize;
use serde_json::Value;

/// Placeholder shown before anything has been received
pub const WAITING_PLACEHOLDER: &str = "Waiting for data...";

/// Placeholder shown while a connection is being opened
pub const CONNECTING_PLACEHOLDER: &str = "Connecting...";

/// One rendered record as it appears in the display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRecord {
    /// Local receive time, `HH:MM:SS`
    pub time: String,
    /// Event type label
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload, pretty-printed when it was valid JSON
    pub body: String,
}

impl fmt::Display for RenderedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}:\n{}", self.time, self.kind, self.body)
    }
}

/// A visible output surface
pub trait Display {
    /// Replace all content with a placeholder text
    fn reset(&mut self, placeholder: &str);

    /// Insert a record before all existing content
    fn prepend(&mut self, record: RenderedRecord);
}

/// In-memory display surface, newest record first
#[derive(Debug, Clone)]
pub struct MemoryDisplay {
    records: VecDeque<RenderedRecord>,
    placeholder: Option<String>,
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self {
            records: VecDeque::new(),
            placeholder: Some(WAITING_PLACEHOLDER.to_string()),
        }
    }
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, newest first
    pub fn records(&self) -> impl Iterator<Item = &RenderedRecord> {
        self.records.iter()
    }

    /// Number of records currently shown
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recently rendered record
    pub fn latest(&self) -> Option<&RenderedRecord> {
        self.records.front()
    }

    /// Placeholder text below the records, if any
    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    /// Whole surface as text: records newest first, then the placeholder
    pub fn to_text(&self) -> String {
        let mut blocks: Vec<String> = self.records.iter().map(|r| r.to_string()).collect();
        if let Some(placeholder) = &self.placeholder {
            blocks.push(placeholder.clone());
        }
        blocks.join("\n")
    }
}

impl Display for MemoryDisplay {
    fn reset(&mut self, placeholder: &str) {
        self.records.clear();
        self.placeholder = Some(placeholder.to_string());
    }

    fn prepend(&mut self, record: RenderedRecord) {
        self.records.push_front(record);
    }
}

/// Largest magnitude below which every integral f64 is exact
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Pretty-print `raw` if it parses as JSON, otherwise return it unchanged
///
/// Integral floats print without a fraction (`25.0` and `1e3` become `25`
/// and `1000`, `-0` becomes `0`).
pub fn format_payload(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|mut value| {
            normalize_numbers(&mut value);
            serde_json::to_string_pretty(&value).ok()
        })
        .unwrap_or_else(|| raw.to_string())
}

fn normalize_numbers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
                    *value = Value::from(f as i64);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_numbers),
        Value::Object(map) => map.values_mut().for_each(normalize_numbers),
        _ => {}
    }
}

/// Formats event records and prepends them to a display
#[derive(Debug, Default)]
pub struct Renderer<D: Display> {
    display: D,
}

impl<D: Display> Renderer<D> {
    pub fn new(display: D) -> Self {
        Self { display }
    }

    /// Render a record stamped with the current local time
    pub fn render(&mut self, kind: &str, raw: &str) {
        self.render_at(kind, raw, Local::now().time());
    }

    /// Render a record stamped with `time`
    pub fn render_at(&mut self, kind: &str, raw: &str, time: NaiveTime) {
        let record = RenderedRecord {
            time: time.format("%H:%M:%S").to_string(),
            kind: kind.to_string(),
            body: format_payload(raw),
        };
        self.display.prepend(record);
    }

    /// Replace the display content with a placeholder
    pub fn reset(&mut self, placeholder: &str) {
        self.display.reset(placeholder);
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn into_display(self) -> D {
        self.display
    }
}
