//! Generated extension files.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Canonical manifest location inside the extension package.
pub const MANIFEST_PATH: &str = "manifest.json";

/// Role of a file inside the generated extension.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileKind {
    Manifest,
    Content,
    Background,
    Asset,
    Vendor,
    Doc,
    #[default]
    Other,
}

impl FileKind {
    /// Parse a kind reported by the model, falling back to `Other`.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

/// One file of the extension package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    pub kind: FileKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind,
            required: false,
            reason: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
