//! Loop Observability
//!
//! Shared logging layer for Loop services:
//! - Correlation context carried across `.await` points (tokio task-local)
//! - Correlation header extraction, generation and outbound propagation
//! - Context-aware log emitter writing to the console and OpenTelemetry
//! - Immutable logger handles with bound fields
//!
//! ```no_run
//! use loop_observability::{Observability, ObservabilityConfig, fields};
//!
//! let observability = Observability::init(ObservabilityConfig::from_env())?;
//! let logger = observability.logger().for_workflow("wf-42", None);
//! logger.info_with(fields! { "attempt" => 1 }, "workflow started");
//! observability.shutdown()?;
//! # Ok::<(), loop_observability::ObservabilityError>(())
//! ```

pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod console;
pub mod correlation;
pub mod emitter;
pub mod error;
pub mod fields;
pub mod headers;
pub mod level;
pub mod logger;
pub mod metrics;
pub mod span;
pub mod telemetry;

pub use bootstrap::{Observability, init_log_runtime};
pub use bridge::EmitterLayer;
pub use config::{ObservabilityConfig, TelemetryConfig};
pub use console::{ConsoleFormatter, ConsoleWriter, LogFormat, MemoryWriter, StdoutWriter};
pub use correlation::CorrelationRecord;
pub use emitter::{EmitterStats, LogEmitter, LogEmitterBuilder, LogRecord};
pub use error::{ObservabilityError, Result};
pub use fields::Fields;
pub use headers::{
    CORRELATION_ID_HEADER, HeaderPropagator, HeaderSource, REQUEST_ID_HEADER,
    create_propagation_headers, extract_correlation_id, generate_correlation_id,
};
pub use level::{LogLevel, Severity};
pub use logger::Logger;
pub use metrics::EmitterMetrics;
pub use span::{SpanAccessor, TraceContext};
pub use telemetry::{DeferredRuntime, NoopRuntime, OtelLogRuntime, TelemetryRecord, TelemetryRuntime};
