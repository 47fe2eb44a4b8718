//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ConvertError;

/// Default budget for one auxiliary download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Fail with [`ConvertError::Timeout`] when `future` outlives `duration`.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ConvertError>>,
) -> Result<T, ConvertError> {
    tokio::time::timeout(duration, future)
        .await
        .unwrap_or_else(|_| Err(ConvertError::Timeout(duration.as_millis() as u64)))
}
