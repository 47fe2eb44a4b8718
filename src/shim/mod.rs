//! Shim-mode conversion: static rewriting of GM_* calls, no model involved.

pub mod snippets;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::debug;

use crate::manifest::{build_manifest, BACKGROUND_PATH, CONTENT_SCRIPT_PATH};
use crate::package::require_file_name;
use crate::types::{FileKind, GeneratedFile, MANIFEST_PATH};
use crate::userscript::{parse_userscript, UserScriptMeta};

static GM_DOT_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bGM\.([A-Za-z]+)\b").expect("GM alias regex must compile"));

static GM_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bGM_([A-Za-z]+)\b").expect("GM identifier regex must compile"));

static UNSAFE_WINDOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bunsafeWindow\b").expect("unsafeWindow regex must compile"));

/// A group of GM APIs served by one shim.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GmApi {
    AddStyle,
    Storage,
    XmlHttpRequest,
    Notification,
    SetClipboard,
    OpenInTab,
    Info,
    Log,
}

impl GmApi {
    /// Map a `GM_<suffix>` identifier suffix to its shim.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "addStyle" => Self::AddStyle,
            "setValue" | "getValue" | "deleteValue" | "listValues" => Self::Storage,
            "xmlhttpRequest" | "xmlHttpRequest" => Self::XmlHttpRequest,
            "notification" => Self::Notification,
            "setClipboard" => Self::SetClipboard,
            "openInTab" => Self::OpenInTab,
            "info" => Self::Info,
            "log" => Self::Log,
            _ => return None,
        })
    }

    /// Map an `@grant` value (`GM_x` or `GM.x`) to its shim.
    pub fn from_grant(grant: &str) -> Option<Self> {
        grant
            .strip_prefix("GM_")
            .or_else(|| grant.strip_prefix("GM."))
            .and_then(Self::from_suffix)
    }

    fn content_shim(self, meta: &UserScriptMeta) -> String {
        match self {
            Self::AddStyle => snippets::ADD_STYLE.to_string(),
            Self::Storage => snippets::STORAGE.to_string(),
            Self::XmlHttpRequest => snippets::XML_HTTP_REQUEST.to_string(),
            Self::Notification => snippets::NOTIFICATION.to_string(),
            Self::SetClipboard => snippets::SET_CLIPBOARD.to_string(),
            Self::OpenInTab => snippets::OPEN_IN_TAB.to_string(),
            Self::Info => snippets::info(
                &js_string(&meta.name),
                &js_string(&meta.version),
                &js_string(&meta.description),
            ),
            Self::Log => snippets::LOG.to_string(),
        }
    }

    /// Service worker handler, for APIs that need extension privileges.
    pub fn background_handler(self) -> Option<&'static str> {
        match self {
            Self::XmlHttpRequest => Some(snippets::XML_HTTP_REQUEST_HANDLER),
            Self::Notification => Some(snippets::NOTIFICATION_HANDLER),
            Self::OpenInTab => Some(snippets::OPEN_IN_TAB_HANDLER),
            _ => None,
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "''".to_string())
}

/// How a shim came to be included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShimReason {
    Granted,
    Used,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimLogEntry {
    pub api: GmApi,
    pub reason: ShimReason,
    pub needs_background: bool,
}

/// Output of [`transform_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedScript {
    pub content_js: String,
    pub background_js: Option<String>,
    pub shim_log: Vec<ShimLogEntry>,
}

fn rewrite_aliases(script: &str) -> String {
    let aliased = GM_DOT_CALL.replace_all(script, |caps: &Captures| match GmApi::from_suffix(&caps[1]) {
        Some(GmApi::XmlHttpRequest) => "GM_xmlhttpRequest".to_string(),
        Some(_) => format!("GM_{}", &caps[1]),
        None => caps[0].to_string(),
    });
    UNSAFE_WINDOW.replace_all(&aliased, "window").into_owned()
}

/// Rewrite a script so it runs as an MV3 content script.
///
/// `GM.x` aliases become `GM_x`, `unsafeWindow` becomes `window`, and a shim
/// is prepended for every API that is granted or referenced.
pub fn transform_script(script: &str, meta: &UserScriptMeta) -> TransformedScript {
    let body = rewrite_aliases(script);

    let granted: BTreeSet<GmApi> = meta.grants.iter().filter_map(|g| GmApi::from_grant(g)).collect();
    let used: BTreeSet<GmApi> = GM_IDENT
        .captures_iter(&body)
        .filter_map(|caps| GmApi::from_suffix(&caps[1]))
        .collect();

    let mut shim_log = Vec::new();
    let mut content_js = String::new();
    let mut handlers = Vec::new();
    for api in GmApi::iter().filter(|api| granted.contains(api) || used.contains(api)) {
        let reason = if granted.contains(&api) {
            ShimReason::Granted
        } else {
            ShimReason::Used
        };
        let handler = api.background_handler();
        shim_log.push(ShimLogEntry {
            api,
            reason,
            needs_background: handler.is_some(),
        });
        content_js.push_str(&api.content_shim(meta));
        handlers.extend(handler);
    }

    if !content_js.is_empty() {
        content_js.insert_str(0, "// ---- GM API shims ----\n");
        content_js.push_str("\n// ---- UserScript ----\n");
    }
    content_js.push_str(&body);

    let background_js = (!handlers.is_empty()).then(|| build_background_script(&handlers));
    debug!(shims = shim_log.len(), background = background_js.is_some(), "script transformed");

    TransformedScript {
        content_js,
        background_js,
        shim_log,
    }
}

/// Concatenate background handlers into a service worker.
pub fn build_background_script(handlers: &[&str]) -> String {
    let mut out = String::from("// Service worker for GM API requests from the content script.\n");
    for handler in handlers {
        out.push_str(handler);
    }
    out
}

/// A complete shim-mode conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ShimConversion {
    pub meta: UserScriptMeta,
    /// Sorted by path.
    pub files: Vec<GeneratedFile>,
    pub shim_log: Vec<ShimLogEntry>,
    pub require_files: Vec<String>,
}

/// Convert a script into manifest.json, content.js and, when needed, background.js.
pub fn convert_with_shims(script: &str) -> ShimConversion {
    let meta = parse_userscript(script);
    let transformed = transform_script(script, &meta);
    let require_files: Vec<String> = meta
        .requires
        .iter()
        .enumerate()
        .map(|(i, url)| require_file_name(url, i))
        .collect();
    let manifest = build_manifest(&meta, transformed.background_js.is_some(), &require_files);

    let mut files = Vec::new();
    if let Some(background) = transformed.background_js {
        files.push(
            GeneratedFile::new(BACKGROUND_PATH, background, FileKind::Background)
                .with_reason("Required by transformed GM APIs in shim mode."),
        );
    }
    files.push(
        GeneratedFile::new(CONTENT_SCRIPT_PATH, transformed.content_js, FileKind::Content)
            .required(true)
            .with_reason("Transformed script output in shim mode."),
    );
    files.push(
        GeneratedFile::new(MANIFEST_PATH, manifest.to_json_pretty(), FileKind::Manifest)
            .required(true)
            .with_reason("Generated from parser metadata in shim mode."),
    );

    ShimConversion {
        meta,
        files,
        shim_log: transformed.shim_log,
        require_files,
    }
}
