//! Process startup wiring
//!
//! [`Observability::init`] turns an [`ObservabilityConfig`] into a ready
//! root [`Logger`]: it installs the W3C trace-context propagator, builds the
//! OTLP log pipeline when telemetry is enabled, and assembles the emitter.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry_otlp::{LogExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::bridge::EmitterLayer;
use crate::config::ObservabilityConfig;
use crate::emitter::LogEmitter;
use crate::error::{ObservabilityError, Result};
use crate::level::LogLevel;
use crate::logger::{self, Logger};
use crate::metrics::EmitterMetrics;
use crate::telemetry::{DeferredRuntime, OtelLogRuntime};

const LOGS_PATH: &str = "/v1/logs";

/// Build the OTLP/HTTP log pipeline described by `config`
pub fn init_log_runtime(config: &ObservabilityConfig) -> Result<OtelLogRuntime> {
    let endpoint = logs_endpoint(&config.telemetry.otlp_endpoint);

    let exporter = LogExporter::builder()
        .with_http()
        .with_endpoint(endpoint.clone())
        .with_timeout(Duration::from_secs(config.telemetry.export_timeout_secs))
        .build()
        .map_err(|e| ObservabilityError::Telemetry(e.to_string()))?;

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attribute(KeyValue::new(
            "deployment.environment",
            config.environment.clone(),
        ))
        .build();

    let provider = SdkLoggerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    tracing::info!(
        endpoint = %endpoint,
        service = %config.service_name,
        "OTLP log export initialized"
    );

    Ok(OtelLogRuntime::new(provider, config.service_name.clone()))
}

fn logs_endpoint(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(LOGS_PATH) {
        base.to_string()
    } else {
        format!("{}{}", base, LOGS_PATH)
    }
}

/// Handles created at startup
pub struct Observability {
    config: ObservabilityConfig,
    emitter: Arc<LogEmitter>,
    logger: Logger,
    runtime: DeferredRuntime,
    metrics: EmitterMetrics,
}

impl Observability {
    /// Validate `config` and build the logging pipeline
    ///
    /// A telemetry pipeline that fails to build is logged and skipped; the
    /// console sink keeps working.
    pub fn init(config: ObservabilityConfig) -> Result<Self> {
        config.validate()?;

        global::set_text_map_propagator(TraceContextPropagator::new());

        let runtime = DeferredRuntime::new();
        if config.telemetry.enabled {
            match init_log_runtime(&config) {
                Ok(otel) => runtime.install(Arc::new(otel))?,
                Err(e) => tracing::warn!(
                    error = %e,
                    "Failed to initialize OpenTelemetry log export, telemetry disabled"
                ),
            }
        }

        let metrics = EmitterMetrics::new()?;
        let emitter = Arc::new(
            LogEmitter::builder(config.service_name.clone(), config.environment.clone())
                .min_level(config.min_level())
                .format(config.log_format())
                .runtime(Arc::new(runtime.clone()))
                .metrics(metrics.clone())
                .build(),
        );

        tracing::debug!(
            service = %config.service_name,
            environment = %config.environment,
            min_level = %emitter.min_level(),
            telemetry = runtime.is_installed(),
            "Observability initialized"
        );

        Ok(Self {
            logger: Logger::new(Arc::clone(&emitter)),
            config,
            emitter,
            runtime,
            metrics,
        })
    }

    pub fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    /// Root logger with no bindings
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn emitter(&self) -> &Arc<LogEmitter> {
        &self.emitter
    }

    pub fn metrics(&self) -> &EmitterMetrics {
        &self.metrics
    }

    /// Whether the OTLP pipeline is installed
    pub fn telemetry_enabled(&self) -> bool {
        self.runtime.is_installed()
    }

    /// Make the root logger available through [`logger::global`]
    pub fn install_global(&self) -> Result<()> {
        logger::install_global(self.logger.clone())
    }

    /// Route `tracing` events through the emitter
    ///
    /// Honors `RUST_LOG` when set, otherwise filters at the emitter's
    /// minimum level.
    pub fn install_tracing_bridge(&self) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(self.emitter.min_level())));

        tracing_subscriber::registry()
            .with(filter)
            .with(EmitterLayer::new(self.logger.clone()))
            .try_init()
            .map_err(|_| ObservabilityError::AlreadyInitialized)
    }

    /// Flush and stop the telemetry pipeline; later log calls are dropped
    pub fn shutdown(&self) -> Result<()> {
        self.emitter.shutdown()
    }
}

fn filter_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error | LogLevel::Fatal => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryRuntime;

    #[test]
    fn test_logs_endpoint() {
        assert_eq!(logs_endpoint("http://localhost:4318"), "http://localhost:4318/v1/logs");
        assert_eq!(logs_endpoint("http://localhost:4318/"), "http://localhost:4318/v1/logs");
        assert_eq!(
            logs_endpoint("http://collector:4318/v1/logs"),
            "http://collector:4318/v1/logs"
        );
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Fatal), "error");
        assert_eq!(filter_directive(LogLevel::Debug), "debug");
    }

    #[test]
    fn test_init_without_telemetry() {
        let observability = Observability::init(ObservabilityConfig {
            environment: "production".to_string(),
            service_name: "payments".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert!(!observability.telemetry_enabled());
        assert_eq!(observability.emitter().service(), "payments");
        assert_eq!(observability.emitter().min_level(), LogLevel::Info);
        assert!(observability.logger().bindings().is_empty());

        observability.logger().info("ready");
        assert_eq!(observability.metrics().records_emitted(LogLevel::Info), 1);

        assert!(observability.shutdown().is_ok());
        assert!(observability.emitter().is_shut_down());
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let result = Observability::init(ObservabilityConfig {
            service_name: String::new(),
            ..Default::default()
        });

        assert!(matches!(result, Err(ObservabilityError::Config(_))));
    }

    #[test]
    fn test_init_log_runtime_builds_without_collector() {
        let mut config = ObservabilityConfig::default();
        config.telemetry.enabled = true;
        config.telemetry.export_timeout_secs = 1;

        let runtime = init_log_runtime(&config).unwrap();
        assert!(runtime.is_initialized());

        let _ = runtime.shutdown();
        assert!(!runtime.is_initialized());
    }
}
