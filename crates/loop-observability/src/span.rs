//! Active span lookup

use opentelemetry::Context;
use opentelemetry::trace::TraceContextExt;
use serde::{Deserialize, Serialize};

/// Trace identifiers of the active span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// W3C trace ID (32 lowercase hex chars)
    pub trace_id: String,
    /// W3C span ID (16 lowercase hex chars)
    pub span_id: String,
    /// W3C trace flags
    pub trace_flags: u8,
}

/// Source of the currently active span
pub trait SpanAccessor: Send + Sync {
    fn active_span(&self) -> Option<TraceContext>;
}

/// Reads the span from the current OpenTelemetry context
#[derive(Debug, Clone, Copy, Default)]
pub struct OtelSpanAccessor;

impl SpanAccessor for OtelSpanAccessor {
    fn active_span(&self) -> Option<TraceContext> {
        let cx = Context::current();
        let span = cx.span();
        let span_context = span.span_context();

        if !span_context.is_valid() {
            return None;
        }

        Some(TraceContext {
            trace_id: span_context.trace_id().to_string(),
            span_id: span_context.span_id().to_string(),
            trace_flags: span_context.trace_flags().to_u8(),
        })
    }
}

/// Accessor that never reports a span
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpanAccessor;

impl SpanAccessor for NoSpanAccessor {
    fn active_span(&self) -> Option<TraceContext> {
        None
    }
}
