//! GreasyFork script download.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::error::ConvertError;
use crate::util::download_text;
use crate::util::retry::RetryPolicy;

pub const GREASYFORK_UPDATE_URL: &str = "https://update.greasyfork.org";

static SCRIPT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/scripts/(\d+)").expect("script id regex must compile"));

static META_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//\s*@name\s+(.+)").expect("meta name regex must compile"));

pub fn is_greasyfork_url(url: &str) -> bool {
    url.contains("greasyfork.org")
}

/// The numeric script id in a `greasyfork.org/scripts/<id>` URL.
pub fn extract_script_id(url: &str) -> Option<&str> {
    SCRIPT_ID.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// The first `@name` in a metadata document.
pub fn parse_name_from_meta(meta: &str) -> Option<&str> {
    META_NAME
        .captures(meta)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
}

/// Downloads scripts from GreasyFork's update host.
#[derive(Debug, Clone)]
pub struct GreasyForkClient {
    base_url: String,
    retry: RetryPolicy,
}

impl Default for GreasyForkClient {
    fn default() -> Self {
        Self::new(GREASYFORK_UPDATE_URL)
    }
}

impl GreasyForkClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch the full script behind a GreasyFork page URL.
    ///
    /// The `.meta.js` document is read first for the script name, which
    /// GreasyFork requires in the `.user.js` path.
    pub async fn fetch_script(&self, page_url: &str) -> Result<String, ConvertError> {
        let id = extract_script_id(page_url).ok_or_else(|| {
            ConvertError::InvalidArgument(
                "Could not extract script ID from URL. Expected format: greasyfork.org/scripts/{ID}".into(),
            )
        })?;

        let meta_url = format!("{}/scripts/{id}.meta.js", self.base_url);
        let meta = download_text(&meta_url, &self.retry).await?;
        let name = parse_name_from_meta(&meta)
            .ok_or_else(|| ConvertError::InvalidArgument("Could not parse @name from meta.js".into()))?;

        let script_url = format!(
            "{}/scripts/{id}/{}.user.js",
            self.base_url,
            urlencoding::encode(name)
        );
        info!(script_id = id, name, "downloading GreasyFork script");
        download_text(&script_url, &self.retry).await
    }
}

/// Fetch a script from GreasyFork's public update host.
pub async fn fetch_from_greasyfork(page_url: &str) -> Result<String, ConvertError> {
    GreasyForkClient::default().fetch_script(page_url).await
}
