//! Remote model transport.

pub mod http;
pub mod openrouter;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::types::{ChatMessage, ChatStreamChunk, FinishReason, ToolInvocation};

pub use openrouter::OpenRouterTransport;

/// A request sent to the model. Tool choice is always automatic.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Tool definition sent to the model API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A complete (non-streamed) model response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    pub finish_reason: Option<FinishReason>,
}

/// Stream of decoded chunks for one streamed turn.
pub type ChunkStream = BoxStream<'static, Result<ChatStreamChunk, ConvertError>>;

/// Trait implemented by every chat-completion transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name, used in logs.
    fn name(&self) -> &str;

    /// One blocking request/response round trip.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ConvertError>;

    /// Open a streaming request.
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ConvertError>;
}

/// Create the default transport for the given config.
pub fn create_transport(config: &ConverterConfig) -> Result<Box<dyn ChatTransport>, ConvertError> {
    Ok(Box::new(OpenRouterTransport::new(config)?))
}
