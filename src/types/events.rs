//! Progress and stream-preview events consumed by callers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Step reported by a progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentStep {
    Analysis,
    PlanFiles,
    WriteFile,
    DeleteFile,
    Check,
    Fix,
    Note,
    Done,
}

/// Emitted once per interpreted tool call, plus one terminal `Done`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub step: AgentStep,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

impl ProgressEvent {
    pub fn new(step: AgentStep, content: impl Into<String>) -> Self {
        Self {
            step,
            content: content.into(),
            file_path: None,
            round: None,
            passed: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_round(mut self, round: usize) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_passed(mut self, passed: bool) -> Self {
        self.passed = Some(passed);
        self
    }
}

/// Live preview of a tool call whose arguments are still arriving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamEvent {
    pub tool_name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Callback receiving progress events.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Callback receiving stream-preview events.
pub type StreamSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;
