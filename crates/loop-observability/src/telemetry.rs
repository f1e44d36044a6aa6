//! OpenTelemetry log sink
//!
//! The emitter talks to the telemetry pipeline only through
//! [`TelemetryRuntime`]. Readiness is an explicit flag on that trait: a
//! runtime that has not been set up reports `is_initialized() == false` and
//! the emitter skips it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use once_cell::sync::OnceCell;
use opentelemetry::Key;
use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _};
use opentelemetry::trace::{SpanId, TraceFlags, TraceId};
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use serde_json::Value;

use crate::error::{ObservabilityError, Result};
use crate::level::Severity;
use crate::span::TraceContext;

/// A log record in the shape handed to the telemetry pipeline
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub timestamp: SystemTime,
    pub severity: Severity,
    pub body: String,
    pub attributes: Vec<(String, Value)>,
    pub trace: Option<TraceContext>,
}

/// Telemetry pipeline the emitter forwards records to
pub trait TelemetryRuntime: Send + Sync {
    /// Whether the pipeline is ready to accept records
    fn is_initialized(&self) -> bool;

    /// Hand one record to the pipeline
    fn emit(&self, record: TelemetryRecord) -> Result<()>;

    /// Flush and stop the pipeline (best effort)
    fn shutdown(&self) -> Result<()>;
}

/// Runtime that is never initialized
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRuntime;

impl TelemetryRuntime for NoopRuntime {
    fn is_initialized(&self) -> bool {
        false
    }

    fn emit(&self, _record: TelemetryRecord) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Slot for a runtime that is installed after the emitter is built
///
/// Reports not-initialized until [`DeferredRuntime::install`] is called.
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct DeferredRuntime {
    slot: Arc<OnceCell<Arc<dyn TelemetryRuntime>>>,
}

impl DeferredRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the concrete runtime; only the first call succeeds
    pub fn install(&self, runtime: Arc<dyn TelemetryRuntime>) -> Result<()> {
        self.slot
            .set(runtime)
            .map_err(|_| ObservabilityError::AlreadyInitialized)
    }

    pub fn is_installed(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl TelemetryRuntime for DeferredRuntime {
    fn is_initialized(&self) -> bool {
        self.slot
            .get()
            .is_some_and(|runtime| runtime.is_initialized())
    }

    fn emit(&self, record: TelemetryRecord) -> Result<()> {
        match self.slot.get() {
            Some(runtime) => runtime.emit(record),
            None => Ok(()),
        }
    }

    fn shutdown(&self) -> Result<()> {
        match self.slot.get() {
            Some(runtime) => runtime.shutdown(),
            None => Ok(()),
        }
    }
}

/// Runtime backed by an OpenTelemetry SDK logger provider
pub struct OtelLogRuntime {
    provider: SdkLoggerProvider,
    logger: SdkLogger,
    shut_down: AtomicBool,
}

impl OtelLogRuntime {
    /// Wrap `provider`, emitting through a logger named `logger_name`
    pub fn new(provider: SdkLoggerProvider, logger_name: impl Into<String>) -> Self {
        let logger = provider.logger(logger_name.into());
        Self {
            provider,
            logger,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn provider(&self) -> &SdkLoggerProvider {
        &self.provider
    }
}

impl TelemetryRuntime for OtelLogRuntime {
    fn is_initialized(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire)
    }

    fn emit(&self, record: TelemetryRecord) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut log = self.logger.create_log_record();
        log.set_timestamp(record.timestamp);
        log.set_observed_timestamp(SystemTime::now());
        log.set_severity_number(record.severity.to_otel());
        log.set_severity_text(record.severity.text());
        log.set_body(AnyValue::from(record.body));

        for (key, value) in record.attributes {
            log.add_attribute(key, to_any_value(value));
        }

        if let Some(trace) = record.trace {
            let trace_id = TraceId::from_hex(&trace.trace_id)
                .map_err(|e| ObservabilityError::Telemetry(format!("invalid trace id: {}", e)))?;
            let span_id = SpanId::from_hex(&trace.span_id)
                .map_err(|e| ObservabilityError::Telemetry(format!("invalid span id: {}", e)))?;
            log.set_trace_context(trace_id, span_id, Some(TraceFlags::new(trace.trace_flags)));
        }

        self.logger.emit(log);
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.provider
            .shutdown()
            .map_err(|e| ObservabilityError::Telemetry(e.to_string()))
    }
}

/// Convert a JSON field value to an OpenTelemetry attribute value
pub(crate) fn to_any_value(value: Value) -> AnyValue {
    match value {
        Value::Null => AnyValue::from("null".to_string()),
        Value::Bool(b) => AnyValue::Boolean(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AnyValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                AnyValue::Double(f)
            } else {
                AnyValue::from(n.to_string())
            }
        }
        Value::String(s) => AnyValue::from(s),
        Value::Array(items) => {
            AnyValue::ListAny(Box::new(items.into_iter().map(to_any_value).collect()))
        }
        Value::Object(map) => {
            let converted: HashMap<Key, AnyValue> = map
                .into_iter()
                .map(|(k, v)| (Key::from(k), to_any_value(v)))
                .collect();
            AnyValue::Map(Box::new(converted))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::logs::Severity as OtelSeverity;
    use opentelemetry_sdk::logs::InMemoryLogExporter;
    use std::sync::atomic::AtomicUsize;

    fn record(severity: Severity) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: SystemTime::now(),
            severity,
            body: "disk almost full".to_string(),
            attributes: vec![
                ("order_id".to_string(), Value::from("ord_1")),
                ("free_bytes".to_string(), Value::from(1024)),
            ],
            trace: Some(TraceContext {
                trace_id: "0af7651916cd43dd8448eb211c80319c".to_string(),
                span_id: "b7ad6b7169203331".to_string(),
                trace_flags: 1,
            }),
        }
    }

    fn runtime_with_exporter() -> (OtelLogRuntime, InMemoryLogExporter) {
        let exporter = InMemoryLogExporter::default();
        let provider = SdkLoggerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (OtelLogRuntime::new(provider, "loop-test"), exporter)
    }

    struct CountingRuntime {
        ready: bool,
        emitted: AtomicUsize,
    }

    impl TelemetryRuntime for CountingRuntime {
        fn is_initialized(&self) -> bool {
            self.ready
        }

        fn emit(&self, _record: TelemetryRecord) -> Result<()> {
            self.emitted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_noop_runtime_is_not_initialized() {
        assert!(!NoopRuntime.is_initialized());
        assert!(NoopRuntime.emit(record(Severity::Info)).is_ok());
    }

    #[test]
    fn test_deferred_runtime_reports_readiness_of_installed_runtime() {
        let deferred = DeferredRuntime::new();
        assert!(!deferred.is_initialized());
        assert!(deferred.emit(record(Severity::Info)).is_ok());

        let inner = Arc::new(CountingRuntime {
            ready: true,
            emitted: AtomicUsize::new(0),
        });
        deferred.install(inner.clone()).unwrap();

        assert!(deferred.is_installed());
        assert!(deferred.is_initialized());
        deferred.emit(record(Severity::Info)).unwrap();
        assert_eq!(inner.emitted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_runtime_install_only_once() {
        let deferred = DeferredRuntime::new();
        deferred.install(Arc::new(NoopRuntime)).unwrap();

        assert!(matches!(
            deferred.install(Arc::new(NoopRuntime)),
            Err(ObservabilityError::AlreadyInitialized)
        ));
        // Installed but the inner runtime is not ready
        assert!(!deferred.is_initialized());
    }

    #[test]
    fn test_deferred_clones_share_slot() {
        let deferred = DeferredRuntime::new();
        let clone = deferred.clone();
        deferred
            .install(Arc::new(CountingRuntime {
                ready: true,
                emitted: AtomicUsize::new(0),
            }))
            .unwrap();

        assert!(clone.is_initialized());
    }

    #[test]
    fn test_otel_runtime_exports_record() {
        let (runtime, exporter) = runtime_with_exporter();
        assert!(runtime.is_initialized());

        runtime.emit(record(Severity::Warn)).unwrap();

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 1);

        let log = &logs[0].record;
        assert_eq!(log.severity_number(), Some(OtelSeverity::Warn));
        assert_eq!(log.severity_text(), Some("WARN"));
        assert_eq!(
            log.body(),
            Some(&AnyValue::from("disk almost full".to_string()))
        );
        assert!(
            log.attributes_iter()
                .any(|(key, _)| key.as_str() == "order_id")
        );

        let trace = log.trace_context().expect("trace context attached");
        assert_eq!(
            trace.trace_id,
            TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap()
        );
    }

    #[test]
    fn test_otel_runtime_rejects_malformed_trace_id() {
        let (runtime, exporter) = runtime_with_exporter();
        let mut bad = record(Severity::Info);
        if let Some(trace) = bad.trace.as_mut() {
            trace.trace_id = "not-hex".to_string();
        }

        assert!(matches!(
            runtime.emit(bad),
            Err(ObservabilityError::Telemetry(_))
        ));
        assert!(exporter.get_emitted_logs().unwrap().is_empty());
    }

    #[test]
    fn test_otel_runtime_stops_after_shutdown() {
        let (runtime, exporter) = runtime_with_exporter();
        runtime.shutdown().unwrap();

        assert!(!runtime.is_initialized());
        runtime.emit(record(Severity::Error)).unwrap();
        // Second shutdown is a no-op
        runtime.shutdown().unwrap();
        assert!(exporter.get_emitted_logs().unwrap_or_default().is_empty());
    }

    #[test]
    fn test_to_any_value_conversions() {
        assert_eq!(to_any_value(Value::from(3)), AnyValue::Int(3));
        assert_eq!(to_any_value(Value::from(1.5)), AnyValue::Double(1.5));
        assert_eq!(to_any_value(Value::Bool(true)), AnyValue::Boolean(true));
        assert_eq!(
            to_any_value(Value::from("x")),
            AnyValue::from("x".to_string())
        );

        match to_any_value(serde_json::json!({"nested": [1, "two"]})) {
            AnyValue::Map(map) => {
                let nested = map.get(&Key::from("nested")).expect("nested key");
                assert!(matches!(nested, AnyValue::ListAny(items) if items.len() == 2));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }
}
