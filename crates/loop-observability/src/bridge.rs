//! `tracing` bridge
//!
//! [`EmitterLayer`] is a `tracing_subscriber` layer that turns `tracing`
//! events from dependencies and application code into log records, so they
//! pick up the same correlation and trace enrichment as direct logger calls.
//!
//! Events from this crate and from the OpenTelemetry SDK are ignored so the
//! emitter's own diagnostics never loop back into it.

use std::fmt;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::fields::Fields;
use crate::level::LogLevel;
use crate::logger::Logger;

const IGNORED_TARGETS: [&str; 2] = ["loop_observability", "opentelemetry"];

/// Forwards `tracing` events to a [`Logger`]
#[derive(Debug, Clone)]
pub struct EmitterLayer {
    logger: Logger,
}

impl EmitterLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for EmitterLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if IGNORED_TARGETS
            .iter()
            .any(|prefix| metadata.target().starts_with(prefix))
        {
            return;
        }

        let level = LogLevel::from(*metadata.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut fields = visitor.fields;
        fields.insert("target", metadata.target());

        self.logger
            .log_with(level, fields, visitor.message.as_deref().unwrap_or_default());
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Fields,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::from(format!("{:?}", value)));
    }
}
