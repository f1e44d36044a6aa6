//! Error types for Loop Observability

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Correlation ID must not be empty")]
    EmptyCorrelationId,

    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Telemetry runtime errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Telemetry runtime already initialized")]
    AlreadyInitialized,

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, ObservabilityError>;
