//! Emitter self-observation metrics (Prometheus)
//!
//! - `loop_log_records_total{level}`: records that passed the level filter
//! - `loop_log_telemetry_failures_total`: telemetry sink errors and panics
//! - `loop_log_console_failures_total`: failed console writes

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

use crate::level::LogLevel;

/// Metrics collector for the log emitter
#[derive(Clone)]
pub struct EmitterMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Log records emitted, by level
    pub records_total: IntCounterVec,
    /// Telemetry sink failures
    pub telemetry_failures_total: IntCounter,
    /// Console sink failures
    pub console_failures_total: IntCounter,
}

impl EmitterMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create a metrics collector registered on `registry`
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let records_total = IntCounterVec::new(
            Opts::new("loop_log_records_total", "Total number of log records emitted"),
            &["level"],
        )?;

        let telemetry_failures_total = IntCounter::with_opts(Opts::new(
            "loop_log_telemetry_failures_total",
            "Log records the telemetry sink failed to accept",
        ))?;

        let console_failures_total = IntCounter::with_opts(Opts::new(
            "loop_log_console_failures_total",
            "Log records the console sink failed to write",
        ))?;

        registry.register(Box::new(records_total.clone()))?;
        registry.register(Box::new(telemetry_failures_total.clone()))?;
        registry.register(Box::new(console_failures_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            records_total,
            telemetry_failures_total,
            console_failures_total,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_emitted(&self, level: LogLevel) {
        self.records_total.with_label_values(&[level.as_str()]).inc();
    }

    pub fn record_telemetry_failure(&self) {
        self.telemetry_failures_total.inc();
    }

    pub fn record_console_failure(&self) {
        self.console_failures_total.inc();
    }

    /// Current count of emitted records at `level`
    pub fn records_emitted(&self, level: LogLevel) -> u64 {
        self.records_total.with_label_values(&[level.as_str()]).get()
    }

    pub fn telemetry_failures(&self) -> u64 {
        self.telemetry_failures_total.get()
    }

    pub fn console_failures(&self) -> u64 {
        self.console_failures_total.get()
    }
}
