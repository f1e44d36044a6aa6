//! Correlation header codec
//!
//! Reads the correlation ID from inbound headers (generating one when the
//! caller sent none) and builds the headers for outbound calls: the
//! correlation ID plus whatever the trace propagator injects.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::Context;
use opentelemetry::propagation::{Injector, TextMapPropagator};
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Canonical correlation header
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Generic request ID header, consulted when no correlation header is present
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Case-insensitive header lookup
pub trait HeaderSource {
    /// Value of the header `name`, compared case-insensitively
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        // HeaderMap normalizes names to lowercase on insert
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Correlation ID for an inbound request
///
/// Checks `X-Correlation-ID`, then `X-Request-ID`; blank values count as
/// missing. Without either header a fresh ID is generated.
pub fn extract_correlation_id<H: HeaderSource + ?Sized>(headers: &H) -> String {
    [CORRELATION_ID_HEADER, REQUEST_ID_HEADER]
        .iter()
        .filter_map(|name| headers.header(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id)
}

/// Generate a new correlation ID
///
/// 128 random bits encoded as URL-safe base64 without padding (22 chars).
pub fn generate_correlation_id() -> String {
    let bytes: [u8; 16] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Injects trace propagation headers for a context
pub trait HeaderPropagator: Send + Sync {
    fn inject(&self, cx: &Context, headers: &mut HeaderMap);
}

/// Delegates to the process-wide propagator registered with OpenTelemetry
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalPropagator;

impl HeaderPropagator for GlobalPropagator {
    fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        opentelemetry::global::get_text_map_propagator(|propagator| {
            propagator.inject_context(cx, &mut HeaderInjector(headers))
        });
    }
}

/// W3C `traceparent`/`tracestate` propagation
#[derive(Debug)]
pub struct W3cPropagator {
    inner: TraceContextPropagator,
}

impl W3cPropagator {
    pub fn new() -> Self {
        Self {
            inner: TraceContextPropagator::new(),
        }
    }
}

impl Default for W3cPropagator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderPropagator for W3cPropagator {
    fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        self.inner.inject_context(cx, &mut HeaderInjector(headers));
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = HeaderName::from_bytes(key.as_bytes())
            && let Ok(value) = HeaderValue::from_str(&value)
        {
            self.0.insert(name, value);
        }
    }
}

/// Headers for an outbound call: correlation ID plus trace propagation
///
/// Trace headers come from the globally registered propagator and the
/// current OpenTelemetry context.
pub fn create_propagation_headers(correlation_id: &str) -> HeaderMap {
    create_propagation_headers_with(correlation_id, &GlobalPropagator)
}

/// Same as [`create_propagation_headers`] with an explicit propagator
pub fn create_propagation_headers_with(
    correlation_id: &str,
    propagator: &dyn HeaderPropagator,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        headers.insert(HeaderName::from_static("x-correlation-id"), value);
    }

    propagator.inject(&Context::current(), &mut headers);
    headers
}

/// Propagation headers for the correlation record active in this task
pub fn current_propagation_headers() -> Option<HeaderMap> {
    crate::correlation::current_correlation_id().map(|id| create_propagation_headers(&id))
}
