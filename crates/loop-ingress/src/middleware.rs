//! Correlation and request logging middleware
//!
//! Layer order matters: `correlation_middleware` must wrap
//! `request_logging_middleware` so the logging layer finds the
//! [`RequestContext`] it installed.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/orders", post(create_order))
//!     .layer(middleware::from_fn(request_logging_middleware))
//!     .layer(middleware::from_fn_with_state(logger, correlation_middleware));
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use loop_observability::{CorrelationRecord, LogLevel, Logger, correlation, extract_correlation_id, fields};

use crate::context::RequestContext;

pub const MERCHANT_ID_HEADER: &str = "X-Merchant-ID";
pub const ORDER_ID_HEADER: &str = "X-Order-ID";
pub const WORKFLOW_ID_HEADER: &str = "X-Workflow-ID";

/// Establish the correlation scope for one request
///
/// Runs the rest of the stack inside [`correlation::scope`] and echoes the
/// correlation ID back in `X-Correlation-ID`.
pub async fn correlation_middleware(
    State(logger): State<Logger>,
    mut req: Request,
    next: Next,
) -> Response {
    let record = Arc::new(correlation_record(req.headers()));

    let request_logger = logger.for_request(
        record.correlation_id(),
        req.method().as_str(),
        req.uri().path(),
    );
    req.extensions_mut().insert(RequestContext {
        correlation: Arc::clone(&record),
        logger: request_logger,
    });

    let correlation_id = record.correlation_id().to_string();
    let mut response = correlation::scope(record, next.run(req)).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-correlation-id"), value);
    }

    response
}

/// Log request start and completion with status and latency
///
/// Uses the request logger from [`RequestContext`], falling back to the
/// global logger. Without either the request passes through silently.
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let logger = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.logger.clone())
        .or_else(|| loop_observability::logger::global().cloned());

    let Some(logger) = logger else {
        return next.run(req).await;
    };

    logger.debug("request started");

    let start = Instant::now();
    let response = next.run(req).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    let status = response.status();
    let level = if status.is_server_error() {
        LogLevel::Error
    } else if status.is_client_error() {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };

    logger.log_lazy(
        level,
        || fields! { "status" => status.as_u16(), "latency_ms" => latency_ms },
        "request completed",
    );

    response
}

fn correlation_record(headers: &HeaderMap) -> CorrelationRecord {
    let correlation_id = extract_correlation_id(headers);
    let mut record = match CorrelationRecord::new(correlation_id) {
        Ok(record) => record,
        Err(_) => CorrelationRecord::generate(),
    };

    if let Some(merchant_id) = header_str(headers, MERCHANT_ID_HEADER) {
        record = record.with_merchant_id(merchant_id);
    }
    if let Some(order_id) = header_str(headers, ORDER_ID_HEADER) {
        record = record.with_order_id(order_id);
    }
    if let Some(workflow_id) = header_str(headers, WORKFLOW_ID_HEADER) {
        record = record.with_workflow_id(workflow_id);
    }

    record
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
