//! Streaming chunk types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Why the model stopped producing output for a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Parse a wire finish reason; unknown values are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

/// One tool-call fragment from a streamed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// A decoded streamed chunk: optional text, tool-call fragments, optional finish reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatStreamChunk {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    pub finish_reason: Option<FinishReason>,
}
