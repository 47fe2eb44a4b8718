//! Utility modules: retry, timeout, plain-text downloads.

pub mod retry;
pub mod timeout;

use crate::error::ConvertError;
use crate::provider::http::shared_client;

use self::retry::RetryPolicy;
use self::timeout::{with_timeout, DOWNLOAD_TIMEOUT};

/// GET a URL as text, retrying transient failures. Non-2xx statuses become
/// [`ConvertError::Api`].
pub async fn download_text(url: &str, policy: &RetryPolicy) -> Result<String, ConvertError> {
    policy
        .execute(url, move || async move {
            with_timeout(DOWNLOAD_TIMEOUT, async {
                let resp = shared_client().get(url).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(ConvertError::api(status.as_u16(), format!("GET {url} failed ({status})")));
                }
                Ok(resp.text().await?)
            })
            .await
        })
        .await
}
