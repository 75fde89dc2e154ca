//! Bounded deadlines for remote store calls.

use std::future::Future;
use std::time::Duration;

use super::errors::{StoreError, StoreResult};

/// Run a store call, failing with [`StoreError::Timeout`] once `limit` elapses.
pub async fn within<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit.as_millis() as u64)),
    }
}
