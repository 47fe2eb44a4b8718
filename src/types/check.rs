//! Self-check reports produced by the `run_check` tool.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Issue severity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// One problem found by a check round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckIssue {
    pub id: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

/// Result of one check round. The last report of a conversion decides its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckReport {
    pub pass: bool,
    pub summary: String,
    pub issues: Vec<CheckIssue>,
}

impl CheckReport {
    /// Report synthesized when the model never ran a check.
    pub fn missing() -> Self {
        Self {
            pass: false,
            summary: "Agent did not run check step.".to_string(),
            issues: vec![CheckIssue {
                id: "missing_check".to_string(),
                severity: Severity::Error,
                file: None,
                message: "run_check was not called.".to_string(),
                fix_hint: None,
            }],
        }
    }
}
