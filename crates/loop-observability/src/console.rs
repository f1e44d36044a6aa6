//! Console sink
//!
//! Production output is one JSON object per line. Everywhere else a
//! colorized summary line is written followed by one indented line per
//! field.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::emitter::LogRecord;
use crate::level::LogLevel;

/// Keys written by the formatter itself; fields with these names are
/// not repeated.
pub const STRUCTURAL_KEYS: [&str; 3] = ["time", "level", "msg"];

/// Keys rendered on the summary line in pretty output
const BASE_KEYS: [&str; 2] = ["service", "env"];

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Destination for formatted console lines
pub trait ConsoleWriter: Send + Sync {
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Writes to the process's standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutWriter;

impl ConsoleWriter for StdoutWriter {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)
    }
}

/// Collects lines in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl ConsoleWriter for MemoryWriter {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .map_err(|_| io::Error::other("console buffer poisoned"))?
            .push(line.to_string());
        Ok(())
    }
}

/// Renders log records for the console
#[derive(Debug, Clone, Copy)]
pub struct ConsoleFormatter {
    format: LogFormat,
    ansi: bool,
}

impl ConsoleFormatter {
    pub fn new(format: LogFormat) -> Self {
        Self { format, ansi: true }
    }

    /// Enable or disable ANSI colors in pretty output
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Render `record` as the text to write; may span several lines
    pub fn render(&self, record: &LogRecord) -> String {
        match self.format {
            LogFormat::Json => render_json(record),
            LogFormat::Pretty => self.render_pretty(record),
        }
    }

    fn render_pretty(&self, record: &LogRecord) -> String {
        let time = record.timestamp.format("%H:%M:%S%.3f");
        let level = record.level.as_str().to_uppercase();
        let service = record.fields.get_str("service").unwrap_or_default();

        let mut out = if self.ansi {
            format!(
                "{DIM}{time}{RESET} {color}{level:<5}{RESET} {DIM}[{service}]{RESET} {msg}",
                color = level_color(record.level),
                msg = record.message,
            )
        } else {
            format!("{time} {level:<5} [{service}] {msg}", msg = record.message)
        };

        for (key, value) in record.fields.iter() {
            if BASE_KEYS.contains(&key.as_str()) || STRUCTURAL_KEYS.contains(&key.as_str()) {
                continue;
            }
            out.push('\n');
            if self.ansi {
                out.push_str(&format!("    {DIM}{key}:{RESET} {}", display_value(value)));
            } else {
                out.push_str(&format!("    {key}: {}", display_value(value)));
            }
        }

        out
    }
}

impl Default for ConsoleFormatter {
    fn default() -> Self {
        Self::new(LogFormat::Pretty)
    }
}

/// Single-line JSON: `time`, `level`, `msg` first, then every field
fn render_json(record: &LogRecord) -> String {
    let mut object = Map::new();
    object.insert(
        "time".to_string(),
        Value::String(record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    object.insert("level".to_string(), Value::String(record.level.as_str().to_string()));
    object.insert("msg".to_string(), Value::String(record.message.clone()));

    for (key, value) in record.fields.iter() {
        if STRUCTURAL_KEYS.contains(&key.as_str()) {
            continue;
        }
        object.insert(key.clone(), value.clone());
    }

    // Display for Value renders compact JSON and cannot fail
    Value::Object(object).to_string()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "\x1b[90m",
        LogLevel::Debug => "\x1b[36m",
        LogLevel::Info => "\x1b[32m",
        LogLevel::Warn => "\x1b[33m",
        LogLevel::Error => "\x1b[31m",
        LogLevel::Fatal => "\x1b[1;35m",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Fields;
    use chrono::{TimeZone, Utc};

    fn record() -> LogRecord {
        LogRecord {
            level: LogLevel::Warn,
            message: "payment retry".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            fields: Fields::new()
                .with("service", "loop")
                .with("env", "production")
                .with("correlation_id", "corr-1")
                .with("attempt", 2),
        }
    }

    #[test]
    fn test_json_output_is_single_parseable_line() {
        let line = ConsoleFormatter::new(LogFormat::Json).render(&record());
        assert!(!line.contains('\n'));

        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["time"], "2026-03-14T09:26:53.000Z");
        assert_eq!(parsed["level"], "warn");
        assert_eq!(parsed["msg"], "payment retry");
        assert_eq!(parsed["service"], "loop");
        assert_eq!(parsed["env"], "production");
        assert_eq!(parsed["correlation_id"], "corr-1");
        assert_eq!(parsed["attempt"], 2);
    }

    #[test]
    fn test_json_structural_keys_not_overridden_by_fields() {
        let mut record = record();
        record.fields.insert("msg", "shadow");
        record.fields.insert("level", "trace");

        let line = ConsoleFormatter::new(LogFormat::Json).render(&record);
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["msg"], "payment retry");
        assert_eq!(parsed["level"], "warn");
    }

    #[test]
    fn test_pretty_output_without_ansi() {
        let text = ConsoleFormatter::new(LogFormat::Pretty)
            .with_ansi(false)
            .render(&record());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "09:26:53.000 WARN  [loop] payment retry");
        assert!(lines.contains(&"    correlation_id: corr-1"));
        assert!(lines.contains(&"    attempt: 2"));
        // service and env are on the summary line only
        assert!(!lines.iter().any(|l| l.trim_start().starts_with("env:")));
    }

    #[test]
    fn test_pretty_output_with_ansi_colors() {
        let text = ConsoleFormatter::new(LogFormat::Pretty).render(&record());
        assert!(text.contains("\x1b[33mWARN"));
        assert!(text.contains(RESET));
    }

    #[test]
    fn test_memory_writer_collects_lines() {
        let writer = MemoryWriter::new();
        writer.write_line("one").unwrap();
        writer.write_line("two").unwrap();
        assert_eq!(writer.lines(), vec!["one", "two"]);

        writer.clear();
        assert!(writer.lines().is_empty());
    }
}
