//! Log levels and their OpenTelemetry severity encoding

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ObservabilityError;

/// Internal log level, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// Lowercase name used in console output and the `level` field
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    /// Parse a level name, falling back to `Info` when it is not recognized
    pub fn parse_or_info(name: &str) -> LogLevel {
        name.parse().unwrap_or(LogLevel::Info)
    }

    pub fn severity(&self) -> Severity {
        Severity::from(*self)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            _ => Err(ObservabilityError::InvalidLevel(s.to_string())),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// OpenTelemetry severity (number + text) for a log record
///
/// Discriminants are the OpenTelemetry severity numbers of the first
/// entry in each severity range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Severity {
    Trace = 1,
    Debug = 5,
    Info = 9,
    Warn = 13,
    Error = 17,
    Fatal = 21,
}

impl Severity {
    pub fn number(&self) -> i32 {
        *self as i32
    }

    pub fn text(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Map a level name to its severity; unknown names map to `Info`
    pub fn from_level_name(name: &str) -> Severity {
        Severity::from(LogLevel::parse_or_info(name))
    }

    pub fn to_otel(&self) -> opentelemetry::logs::Severity {
        use opentelemetry::logs::Severity as Otel;
        match self {
            Severity::Trace => Otel::Trace,
            Severity::Debug => Otel::Debug,
            Severity::Info => Otel::Info,
            Severity::Warn => Otel::Warn,
            Severity::Error => Otel::Error,
            Severity::Fatal => Otel::Fatal,
        }
    }
}

impl From<LogLevel> for Severity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Severity::Trace,
            LogLevel::Debug => Severity::Debug,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warn,
            LogLevel::Error => Severity::Error,
            LogLevel::Fatal => Severity::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_parse_level_case_insensitive() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!(" Debug ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_severity_table() {
        let expected = [
            (LogLevel::Trace, 1, "TRACE"),
            (LogLevel::Debug, 5, "DEBUG"),
            (LogLevel::Info, 9, "INFO"),
            (LogLevel::Warn, 13, "WARN"),
            (LogLevel::Error, 17, "ERROR"),
            (LogLevel::Fatal, 21, "FATAL"),
        ];

        for (level, number, text) in expected {
            let severity = level.severity();
            assert_eq!(severity.number(), number);
            assert_eq!(severity.text(), text);
            assert_eq!(severity.to_otel() as i32, number);
        }
    }

    #[test]
    fn test_unknown_level_name_maps_to_info() {
        assert_eq!(Severity::from_level_name("notice"), Severity::Info);
        assert_eq!(Severity::from_level_name(""), Severity::Info);
        assert_eq!(Severity::from_level_name("fatal"), Severity::Fatal);
    }

    #[test]
    fn test_tracing_level_conversion() {
        assert_eq!(LogLevel::from(tracing::Level::WARN), LogLevel::Warn);
        assert_eq!(LogLevel::from(tracing::Level::TRACE), LogLevel::Trace);
    }
}
