//! UserScript metadata header parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "Converted Extension";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_RUN_AT: &str = "document_idle";
pub const FALLBACK_MATCH: &str = "*://*/*";

static HEADER_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)//\s*==UserScript==(.*?)//\s*==/UserScript==").expect("header block regex must compile")
});

static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*//\s*@(\S+)\s*(.*?)\s*$").expect("header line regex must compile"));

/// Metadata declared in a `==UserScript==` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScriptMeta {
    pub name: String,
    pub description: String,
    pub version: String,
    /// Chrome match patterns from `@match` and convertible `@include`s.
    pub matches: Vec<String>,
    pub exclude_matches: Vec<String>,
    pub requires: Vec<String>,
    /// Granted GM APIs, without `none`.
    pub grants: Vec<String>,
    pub run_at: String,
    pub icon: Option<String>,
    /// Problems found while reading the header.
    pub warnings: Vec<String>,
}

impl Default for UserScriptMeta {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            description: String::new(),
            version: DEFAULT_VERSION.to_string(),
            matches: Vec::new(),
            exclude_matches: Vec::new(),
            requires: Vec::new(),
            grants: Vec::new(),
            run_at: DEFAULT_RUN_AT.to_string(),
            icon: None,
            warnings: Vec::new(),
        }
    }
}

/// Parse the metadata header of a UserScript.
///
/// Never fails: anything missing falls back to a default and is reported in
/// `warnings`.
pub fn parse_userscript(text: &str) -> UserScriptMeta {
    let mut meta = UserScriptMeta::default();

    let Some(block) = HEADER_BLOCK.captures(text).and_then(|c| c.get(1)) else {
        meta.warnings.push("No ==UserScript== block found. Using defaults.".to_string());
        return meta;
    };

    for line in block.as_str().lines() {
        let Some(caps) = HEADER_LINE.captures(line) else {
            continue;
        };
        let key = &caps[1];
        let value = caps.get(2).map_or("", |m| m.as_str());

        match key {
            "name" if !value.is_empty() => meta.name = value.to_string(),
            "description" => meta.description = value.to_string(),
            "version" if !value.is_empty() => meta.version = value.to_string(),
            "match" if !value.is_empty() => meta.matches.push(value.to_string()),
            "include" if !value.is_empty() => match glob_to_match_pattern(value) {
                Some(pattern) => meta.matches.push(pattern),
                None => meta.warnings.push(format!(
                    "@include \"{value}\" could not be converted to a Chrome match pattern and was skipped."
                )),
            },
            "exclude" if !value.is_empty() => match glob_to_match_pattern(value) {
                Some(pattern) => meta.exclude_matches.push(pattern),
                None => meta.warnings.push(format!(
                    "@exclude \"{value}\" could not be converted to a Chrome match pattern and was skipped."
                )),
            },
            "exclude-match" if !value.is_empty() => meta.exclude_matches.push(value.to_string()),
            "require" if !value.is_empty() => meta.requires.push(value.to_string()),
            "grant" if !value.is_empty() && value != "none" => meta.grants.push(value.to_string()),
            "run-at" => meta.run_at = value.replace('-', "_"),
            "icon" | "icon64" if !value.is_empty() && meta.icon.is_none() => {
                meta.icon = Some(value.to_string());
            }
            _ => {}
        }
    }

    if meta.matches.is_empty() {
        meta.matches.push(FALLBACK_MATCH.to_string());
        meta.warnings.push(format!(
            "No @match or @include found. Defaulted to \"{FALLBACK_MATCH}\". Please restrict this in manifest.json."
        ));
    }

    meta
}

/// Convert a Greasemonkey `@include`/`@exclude` glob into a Chrome match pattern.
pub fn glob_to_match_pattern(glob: &str) -> Option<String> {
    if glob.starts_with("http://") || glob.starts_with("https://") || glob.starts_with("*://") {
        return Some(glob.replace("**", "*"));
    }
    if let Some(rest) = glob.strip_prefix("http*://") {
        return Some(format!("*://{rest}"));
    }
    if !glob.contains("://") && !glob.starts_with('/') {
        return Some(format!("*://{}", glob.replace("**", "*")));
    }
    None
}
