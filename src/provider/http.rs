//! Shared HTTP client, header builders, and status mapping.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{ConvertError, ErrorCode, ErrorDetails};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Bearer headers plus OpenRouter app attribution (`HTTP-Referer`, `X-Title`).
pub fn openrouter_headers(api_key: &str, referer: &str, title: &str) -> HeaderMap {
    let mut headers = bearer_headers(api_key);
    if let Ok(val) = HeaderValue::from_str(referer) {
        headers.insert(HeaderName::from_static("http-referer"), val);
    }
    if let Ok(val) = HeaderValue::from_str(title) {
        headers.insert(HeaderName::from_static("x-title"), val);
    }
    headers
}

/// Map a non-success HTTP status and its body to an error.
pub fn status_to_error(status: u16, body: &str) -> ConvertError {
    match status {
        401 | 403 => ConvertError::Authentication(format!("OpenRouter {status}: {body}")),
        429 => {
            let payload = serde_json::from_str::<serde_json::Value>(body).ok();
            let error = payload.as_ref().and_then(|v| v.get("error"));
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| body.trim().to_string());
            ConvertError::RateLimited {
                message: format!("OpenRouter {status}: {message}"),
                retry_after_ms: error
                    .and_then(|e| e.get("retry_after"))
                    .and_then(|r| r.as_f64())
                    .map(|s| (s * 1000.0) as u64),
            }
        }
        _ => ConvertError::api_with_details(
            status,
            body,
            ErrorDetails {
                code: Some(ErrorCode::from_status(status)),
                provider_code: None,
                request_id: None,
            },
        ),
    }
}
