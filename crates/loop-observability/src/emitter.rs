//! Context-aware log emitter
//!
//! Builds one [`LogRecord`] per log call, enriched with the active span and
//! correlation record, and delivers it to the console sink and the
//! telemetry sink. The two sinks fail independently: nothing the telemetry
//! runtime does (error or panic) reaches the console path or the caller.

use std::io::IsTerminal;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::config::ObservabilityConfig;
use crate::console::{ConsoleFormatter, ConsoleWriter, LogFormat, STRUCTURAL_KEYS, StdoutWriter};
use crate::correlation;
use crate::error::{ObservabilityError, Result};
use crate::fields::Fields;
use crate::level::LogLevel;
use crate::metrics::EmitterMetrics;
use crate::span::{OtelSpanAccessor, SpanAccessor, TraceContext};
use crate::telemetry::{NoopRuntime, TelemetryRecord, TelemetryRuntime};

/// One enriched log event
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Base, context, bound and call-site fields, already merged
    pub fields: Fields,
}

impl LogRecord {
    pub fn service(&self) -> Option<&str> {
        self.fields.get_str("service")
    }

    pub fn environment(&self) -> Option<&str> {
        self.fields.get_str("env")
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.fields.get_str("correlation_id")
    }

    /// Shape the record for the telemetry pipeline
    ///
    /// Structural keys (`msg`, `level`, `time`) travel as the body and
    /// severity, so they are left out of the attributes.
    pub fn to_telemetry(&self, trace: Option<TraceContext>) -> TelemetryRecord {
        let attributes = self
            .fields
            .iter()
            .filter(|(key, _)| !STRUCTURAL_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        TelemetryRecord {
            timestamp: SystemTime::from(self.timestamp),
            severity: self.level.severity(),
            body: self.message.clone(),
            attributes,
            trace,
        }
    }
}

/// Counters kept by the emitter about its own behavior
#[derive(Debug, Default)]
pub struct EmitterStats {
    emitted: AtomicU64,
    telemetry_failures: AtomicU64,
    console_failures: AtomicU64,
}

impl EmitterStats {
    /// Records that passed the level filter
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Telemetry emissions that returned an error or panicked
    pub fn telemetry_failures(&self) -> u64 {
        self.telemetry_failures.load(Ordering::Relaxed)
    }

    /// Console writes that failed
    pub fn console_failures(&self) -> u64 {
        self.console_failures.load(Ordering::Relaxed)
    }
}

/// Fans log records out to the console and telemetry sinks
pub struct LogEmitter {
    service: String,
    environment: String,
    min_level: LogLevel,
    formatter: ConsoleFormatter,
    console: Arc<dyn ConsoleWriter>,
    runtime: Arc<dyn TelemetryRuntime>,
    spans: Arc<dyn SpanAccessor>,
    metrics: Option<EmitterMetrics>,
    stats: EmitterStats,
    closed: AtomicBool,
}

impl LogEmitter {
    pub fn builder(service: impl Into<String>, environment: impl Into<String>) -> LogEmitterBuilder {
        LogEmitterBuilder::new(service, environment)
    }

    /// Emitter configured from `config`, writing to stdout
    pub fn from_config(config: &ObservabilityConfig, runtime: Arc<dyn TelemetryRuntime>) -> Self {
        LogEmitter::builder(config.service_name.clone(), config.environment.clone())
            .min_level(config.min_level())
            .format(config.log_format())
            .runtime(runtime)
            .build()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn stats(&self) -> &EmitterStats {
        &self.stats
    }

    /// Whether a call at `level` would produce output
    ///
    /// Callers can check this before building expensive fields.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level && !self.closed.load(Ordering::Acquire)
    }

    /// Emit one log call
    ///
    /// `bindings` are the logger handle's bound fields and `fields` the
    /// call-site fields; call-site values win on key collisions. Calls
    /// below the configured level return immediately.
    pub fn emit(&self, level: LogLevel, bindings: &Fields, fields: Option<&Fields>, message: &str) {
        if !self.enabled(level) {
            return;
        }

        let trace = self.spans.active_span();
        let record = self.build_record(level, bindings, fields, message, trace.as_ref());

        self.stats.emitted.fetch_add(1, Ordering::Relaxed);
        if let Some(ref metrics) = self.metrics {
            metrics.record_emitted(level);
        }

        self.write_console(&record);
        self.forward_telemetry(&record, trace);
    }

    /// Merge fields in precedence order: base < context < bound < call-site
    pub fn build_record(
        &self,
        level: LogLevel,
        bindings: &Fields,
        fields: Option<&Fields>,
        message: &str,
        trace: Option<&TraceContext>,
    ) -> LogRecord {
        let mut merged = Fields::new()
            .with("service", self.service.as_str())
            .with("env", self.environment.as_str());

        if let Some(trace) = trace {
            merged.insert("trace_id", trace.trace_id.as_str());
            merged.insert("span_id", trace.span_id.as_str());
        }

        if let Some(record) = correlation::current() {
            for (key, value) in record.to_fields() {
                merged.insert(key, value);
            }
        }

        merged.extend(bindings);
        if let Some(fields) = fields {
            merged.extend(fields);
        }

        LogRecord {
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
            fields: merged,
        }
    }

    fn write_console(&self, record: &LogRecord) {
        let text = self.formatter.render(record);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.console.write_line(&text)));

        let failed = match outcome {
            Ok(Ok(())) => false,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "console sink write failed");
                true
            }
            Err(_) => {
                tracing::debug!("console sink panicked");
                true
            }
        };

        if failed {
            self.stats.console_failures.fetch_add(1, Ordering::Relaxed);
            if let Some(ref metrics) = self.metrics {
                metrics.record_console_failure();
            }
        }
    }

    fn forward_telemetry(&self, record: &LogRecord, trace: Option<TraceContext>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if !self.runtime.is_initialized() {
                return Ok(());
            }
            self.runtime.emit(record.to_telemetry(trace))
        }));

        let failed = match outcome {
            Ok(Ok(())) => false,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "telemetry sink rejected log record");
                true
            }
            Err(_) => {
                tracing::debug!("telemetry sink panicked");
                true
            }
        };

        if failed {
            self.stats.telemetry_failures.fetch_add(1, Ordering::Relaxed);
            if let Some(ref metrics) = self.metrics {
                metrics.record_telemetry_failure();
            }
        }
    }

    /// Stop accepting records and shut the telemetry runtime down
    ///
    /// Best effort: records already handed to the runtime may or may not be
    /// flushed. Subsequent calls return `Ok(())`.
    pub fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.runtime.shutdown())) {
            Ok(Ok(())) => {
                tracing::info!(service = %self.service, "log emitter shut down");
                Ok(())
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "telemetry runtime shutdown failed");
                Err(err)
            }
            Err(_) => {
                tracing::warn!("telemetry runtime panicked during shutdown");
                Err(ObservabilityError::Telemetry(
                    "runtime panicked during shutdown".to_string(),
                ))
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Builder for [`LogEmitter`]
pub struct LogEmitterBuilder {
    service: String,
    environment: String,
    min_level: Option<LogLevel>,
    format: Option<LogFormat>,
    ansi: Option<bool>,
    console: Option<Arc<dyn ConsoleWriter>>,
    runtime: Option<Arc<dyn TelemetryRuntime>>,
    spans: Option<Arc<dyn SpanAccessor>>,
    metrics: Option<EmitterMetrics>,
}

impl LogEmitterBuilder {
    pub fn new(service: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            environment: environment.into(),
            min_level: None,
            format: None,
            ansi: None,
            console: None,
            runtime: None,
            spans: None,
            metrics: None,
        }
    }

    /// Minimum level; defaults to `info` in production, `debug` otherwise
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    /// Console format; defaults to JSON in production, pretty otherwise
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Force ANSI colors on or off; defaults to on when stdout is a terminal
    pub fn ansi(mut self, ansi: bool) -> Self {
        self.ansi = Some(ansi);
        self
    }

    pub fn console(mut self, console: Arc<dyn ConsoleWriter>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn TelemetryRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn span_accessor(mut self, spans: Arc<dyn SpanAccessor>) -> Self {
        self.spans = Some(spans);
        self
    }

    pub fn metrics(mut self, metrics: EmitterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> LogEmitter {
        let production = is_production(&self.environment);
        let min_level = self.min_level.unwrap_or(if production {
            LogLevel::Info
        } else {
            LogLevel::Debug
        });
        let format = self.format.unwrap_or(if production {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        });
        let ansi = self
            .ansi
            .unwrap_or_else(|| self.console.is_none() && std::io::stdout().is_terminal());

        LogEmitter {
            service: self.service,
            environment: self.environment,
            min_level,
            formatter: ConsoleFormatter::new(format).with_ansi(ansi),
            console: self.console.unwrap_or_else(|| Arc::new(StdoutWriter)),
            runtime: self.runtime.unwrap_or_else(|| Arc::new(NoopRuntime)),
            spans: self.spans.unwrap_or_else(|| Arc::new(OtelSpanAccessor)),
            metrics: self.metrics,
            stats: EmitterStats::default(),
            closed: AtomicBool::new(false),
        }
    }
}

pub(crate) fn is_production(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("production")
}
