//! Deadlines for collaborator calls.

use std::future::Future;
use std::time::Duration;

use tracing::error;

use crate::error::{RagError, Result};

/// Await `future`, failing with [`RagError::TimeoutError`] once `limit`
/// elapses. The inner call is dropped on timeout and never retried.
pub(crate) async fn with_timeout<T, F>(operation: &str, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            error!(operation, timeout_ms, "collaborator call timed out");
            Err(RagError::timeout(operation, timeout_ms))
        }
    }
}
