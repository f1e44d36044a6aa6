//! Observability configuration
//!
//! Loaded from a TOML or YAML file (or defaults), then overridden by
//! environment variables. Read once at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::console::LogFormat;
use crate::emitter::is_production;
use crate::error::{ObservabilityError, Result};
use crate::level::LogLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Deployment environment name
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Minimum log level; derived from the environment when unset
    #[serde(default)]
    pub log_level: Option<String>,

    /// Console format; derived from the environment when unset
    #[serde(default)]
    pub log_format: Option<LogFormat>,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// OpenTelemetry log export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// OTLP/HTTP collector base URL (e.g., http://localhost:4318)
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,

    #[serde(default = "default_export_timeout_secs")]
    pub export_timeout_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            service_name: default_service_name(),
            log_level: None,
            log_format: None,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            export_timeout_secs: default_export_timeout_secs(),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents).map_err(|e| ObservabilityError::ConfigParse(e.to_string()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .map_err(|e| ObservabilityError::ConfigParse(e.to_string()))?
        };

        Ok(config)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.merge_env();
        config
    }

    /// Apply overrides from the process environment
    pub fn merge_env(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps variable names to values
    pub fn merge_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("LOOP_ENV") {
            self.environment = val;
        }

        if let Some(val) = lookup("LOOP_SERVICE_NAME") {
            self.service_name = val;
        }

        if let Some(val) = lookup("LOOP_LOG_LEVEL") {
            self.log_level = Some(val);
        }

        if let Some(val) = lookup("LOOP_LOG_FORMAT") {
            match val.to_lowercase().as_str() {
                "json" => self.log_format = Some(LogFormat::Json),
                "pretty" => self.log_format = Some(LogFormat::Pretty),
                _ => tracing::warn!(value = %val, "Invalid LOOP_LOG_FORMAT, using default"),
            }
        }

        if let Some(val) = lookup("LOOP_TELEMETRY_ENABLED") {
            match val.parse::<bool>() {
                Ok(enabled) => self.telemetry.enabled = enabled,
                Err(_) => tracing::warn!(value = %val, "Invalid LOOP_TELEMETRY_ENABLED, ignoring"),
            }
        }

        if let Some(val) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = val;
        }
    }

    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }

    /// Effective minimum level
    ///
    /// An unset or unrecognized `log_level` falls back to `info` in
    /// production and `debug` elsewhere.
    pub fn min_level(&self) -> LogLevel {
        let fallback = if self.is_production() {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };

        match self.log_level.as_deref() {
            Some(level) => level.parse().unwrap_or_else(|_| {
                tracing::warn!(configured = level, "Unrecognized log level, using {}", fallback);
                fallback
            }),
            None => fallback,
        }
    }

    /// Effective console format
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or(if self.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(ObservabilityError::Config(
                "service_name must not be empty".to_string(),
            ));
        }

        if self.telemetry.enabled && self.telemetry.otlp_endpoint.trim().is_empty() {
            return Err(ObservabilityError::Config(
                "telemetry.otlp_endpoint is required when telemetry is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_service_name() -> String {
    "loop".to_string()
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4318".to_string()
}

fn default_export_timeout_secs() -> u64 {
    10
}

fn default_false() -> bool {
    false
}
