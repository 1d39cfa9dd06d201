//! Output formatting for ssemon (text, json)

use std::str::FromStr;

use clap::ValueEnum;
use colored::Colorize;
use ssemon_client::controller::{ERROR_KIND, INFO_KIND};
use ssemon_client::{Display, MemoryDisplay, RenderedRecord};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable records (default)
    #[default]
    Text,
    /// One JSON object per record
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown output format '{}'", other),
        }
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Terminal display surface using this context's format
    pub fn display(&self) -> TerminalDisplay {
        TerminalDisplay::new(self.format, self.quiet)
    }
}

/// Display surface that echoes every new record to stdout
///
/// The full surface (newest first) is kept in a [`MemoryDisplay`] so it can be
/// printed again on request.
pub struct TerminalDisplay {
    inner: MemoryDisplay,
    format: OutputFormat,
    quiet: bool,
}

impl TerminalDisplay {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self {
            inner: MemoryDisplay::new(),
            format,
            quiet,
        }
    }

    pub fn surface(&self) -> &MemoryDisplay {
        &self.inner
    }

    /// Print the whole surface, newest record first
    pub fn print_surface(&self) {
        match self.format {
            OutputFormat::Text => {
                for record in self.inner.records() {
                    println!("{}", format_record(record));
                }
                if let Some(placeholder) = self.inner.placeholder() {
                    println!("{}", placeholder.dimmed());
                }
            }
            OutputFormat::Json => {
                let records: Vec<&RenderedRecord> = self.inner.records().collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string())
                );
            }
        }
    }
}

impl Display for TerminalDisplay {
    fn reset(&mut self, placeholder: &str) {
        if self.format == OutputFormat::Text && !self.quiet {
            println!("{}", placeholder.dimmed());
        }
        self.inner.reset(placeholder);
    }

    fn prepend(&mut self, record: RenderedRecord) {
        match self.format {
            OutputFormat::Text => println!("{}", format_record(&record)),
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(&record) {
                    println!("{}", json);
                }
            }
        }
        self.inner.prepend(record);
    }
}

/// Colored text form of a record: `[time] type:` header, payload below
fn format_record(record: &RenderedRecord) -> String {
    let header = format!("[{}] {}:", record.time, record.kind);
    let header = match record.kind.as_str() {
        ERROR_KIND => header.red().bold(),
        INFO_KIND => header.yellow().bold(),
        _ => header.blue().bold(),
    };
    let body = if record.kind == ERROR_KIND {
        record.body.red()
    } else {
        record.body.green()
    };
    format!("{}\n{}", header, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: &str, body: &str) -> RenderedRecord {
        RenderedRecord {
            time: "08:30:00".into(),
            kind: kind.into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_record_plain() {
        colored::control::set_override(false);
        assert_eq!(
            format_record(&record("sensor-data", "{\n  \"a\": 1\n}")),
            "[08:30:00] sensor-data:\n{\n  \"a\": 1\n}"
        );
    }

    #[test]
    fn test_terminal_display_keeps_newest_first() {
        let mut display = TerminalDisplay::new(OutputFormat::Json, true);

        display.reset("Connecting...");
        display.prepend(record("message", "a"));
        display.prepend(record("end", "b"));

        let kinds: Vec<&str> = display.surface().records().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["end", "message"]);
        assert_eq!(display.surface().placeholder(), Some("Connecting..."));
    }
}
