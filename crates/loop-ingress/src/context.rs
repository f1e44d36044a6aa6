//! Per-request context handed to handlers

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use loop_observability::{CorrelationRecord, Logger};

/// Correlation record and request logger for one inbound request
///
/// Inserted into request extensions by
/// [`correlation_middleware`](crate::middleware::correlation_middleware).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation: Arc<CorrelationRecord>,
    pub logger: Logger,
}

impl RequestContext {
    pub fn correlation_id(&self) -> &str {
        self.correlation.correlation_id()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
