//! Correlation context propagation
//!
//! The active [`CorrelationRecord`] is stored in a tokio task-local, so it is
//! attached to the logical task rather than to a thread or a global. Every
//! `.await` inside a [`scope`] observes the record installed by that scope,
//! even when other requests interleave on the same worker.
//!
//! Spawned tasks do not inherit task-locals; use [`spawn`] or [`bind`] to
//! carry the caller's record into a new task.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{ObservabilityError, Result};

tokio::task_local! {
    static CURRENT: Arc<CorrelationRecord>;
}

/// Identifiers tying together all records of one logical request or task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    merchant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workflow_id: Option<String>,
}

impl CorrelationRecord {
    /// Create a record; the correlation ID must contain a non-blank value
    pub fn new(correlation_id: impl Into<String>) -> Result<Self> {
        let correlation_id = correlation_id.into();
        if correlation_id.trim().is_empty() {
            return Err(ObservabilityError::EmptyCorrelationId);
        }

        Ok(Self {
            correlation_id,
            merchant_id: None,
            order_id: None,
            workflow_id: None,
        })
    }

    /// Create a record with a freshly generated correlation ID
    pub fn generate() -> Self {
        Self {
            correlation_id: crate::headers::generate_correlation_id(),
            merchant_id: None,
            order_id: None,
            workflow_id: None,
        }
    }

    /// Set the merchant ID
    pub fn with_merchant_id(mut self, merchant_id: impl Into<String>) -> Self {
        self.merchant_id = Some(merchant_id.into());
        self
    }

    /// Set the order ID
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Set the workflow ID
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn merchant_id(&self) -> Option<&str> {
        self.merchant_id.as_deref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    /// Log fields contributed by this record, in `snake_case` naming
    pub fn to_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![("correlation_id", self.correlation_id.as_str())];

        if let Some(ref merchant_id) = self.merchant_id {
            fields.push(("merchant_id", merchant_id));
        }
        if let Some(ref order_id) = self.order_id {
            fields.push(("order_id", order_id));
        }
        if let Some(ref workflow_id) = self.workflow_id {
            fields.push(("workflow_id", workflow_id));
        }

        fields
    }
}

/// Record active for the calling task, if any scope installed one
pub fn current() -> Option<Arc<CorrelationRecord>> {
    CURRENT.try_with(Arc::clone).ok()
}

/// Correlation ID of the active record, if any
pub fn current_correlation_id() -> Option<String> {
    CURRENT
        .try_with(|record| record.correlation_id.clone())
        .ok()
}

/// Run `future` with `record` installed for its entire extent
///
/// The previous record (or none) is visible again once the future completes
/// or is dropped. The future's output, including any error, is returned
/// unchanged.
pub async fn scope<F>(record: impl Into<Arc<CorrelationRecord>>, future: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(record.into(), future).await
}

/// Run the synchronous closure `f` with `record` installed
///
/// Errors returned by `f` are passed through untouched; a panic unwinds
/// after the previous record has been restored.
pub fn sync_scope<F, R>(record: impl Into<Arc<CorrelationRecord>>, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT.sync_scope(record.into(), f)
}

/// Wrap `future` so it runs under the caller's current record
///
/// Useful for futures that will be polled outside the current scope, such as
/// spawned tasks or work handed to another executor.
pub fn bind<F>(future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let record = current();
    async move {
        match record {
            Some(record) => CURRENT.scope(record, future).await,
            None => future.await,
        }
    }
}

/// `tokio::spawn` that carries the caller's record into the new task
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(bind(future))
}
