//! Agent-mode conversion: a bounded tool-calling conversation with a remote
//! model that writes, checks and fixes the extension files.

pub mod accumulator;
pub mod dispatch;
pub mod finalize;
pub mod partial_json;
pub mod prompt;
pub mod runner;
pub mod state;
pub mod tools;
pub mod turn;

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::types::{CheckReport, GeneratedFile};

pub use dispatch::ToolCommand;
pub use runner::{AgentConverter, ConvertRequest};
pub use state::ConversionState;

/// Identifier attached to every log line of one conversion.
pub type ConversionId = Uuid;

/// Why the turn loop stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoopExit {
    /// The last tool call batch left a passing check.
    CheckPassed,
    /// The model stopped calling tools after a passing check.
    IdleAfterPass,
    /// The turn budget ran out.
    TurnBudgetExhausted,
    /// The fix-round ceiling was hit with a failing check.
    FixRoundsExhausted,
}

/// An accepted conversion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionResult {
    pub analysis: String,
    /// Sorted by path.
    pub files: Vec<GeneratedFile>,
    pub checks: Vec<CheckReport>,
    pub notes: Vec<String>,
    pub exit: LoopExit,
    pub turns: usize,
}

impl ConversionResult {
    /// One line per issue across every check round, numbered from 1:
    /// `[Check #n] SEVERITY: message (file)`.
    pub fn check_warnings(&self) -> Vec<String> {
        self.checks
            .iter()
            .enumerate()
            .flat_map(|(round, check)| {
                check.issues.iter().map(move |issue| {
                    let severity = issue.severity.to_string().to_uppercase();
                    match &issue.file {
                        Some(file) => format!("[Check #{}] {severity}: {} ({file})", round + 1, issue.message),
                        None => format!("[Check #{}] {severity}: {}", round + 1, issue.message),
                    }
                })
            })
            .collect()
    }
}
