//! Loop Ingress
//!
//! Axum middleware that gives every inbound request a correlation scope:
//! - Correlation ID taken from `X-Correlation-ID` / `X-Request-ID` or generated
//! - Merchant, order and workflow IDs picked up from request headers
//! - A request-scoped [`Logger`](loop_observability::Logger) for handlers
//! - Request start/finish logging with status and latency

pub mod context;
pub mod middleware;

pub use context::RequestContext;
pub use middleware::{
    MERCHANT_ID_HEADER, ORDER_ID_HEADER, WORKFLOW_ID_HEADER, correlation_middleware,
    request_logging_middleware,
};
