//! One conversational turn with the model.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::ConvertError;
use crate::provider::{ChatRequest, ChatTransport};
use crate::types::{ChatMessage, FinishReason, StreamSink, ToolInvocation};

use super::accumulator::ToolCallAccumulator;

/// Normalized result of a turn, whichever request path produced it.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub assistant_message: ChatMessage,
    pub tool_calls: Vec<ToolInvocation>,
    pub finish_reason: FinishReason,
}

impl TurnOutcome {
    fn new(text: Option<String>, tool_calls: Vec<ToolInvocation>, finish_reason: FinishReason) -> Self {
        Self {
            assistant_message: ChatMessage::assistant(text, tool_calls.clone()),
            tool_calls,
            finish_reason,
        }
    }
}

/// Run a turn, streaming when a preview sink is given.
///
/// The request is abandoned as soon as `cancel` fires.
pub async fn execute_turn(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
    preview: Option<&StreamSink>,
    cancel: &CancellationToken,
) -> Result<TurnOutcome, ConvertError> {
    let turn = async {
        match preview {
            Some(sink) => streamed_turn(transport, request, sink).await,
            None => blocking_turn(transport, request).await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ConvertError::Canceled),
        outcome = turn => outcome,
    }
}

/// Single request/response turn.
pub async fn blocking_turn(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
) -> Result<TurnOutcome, ConvertError> {
    let response = transport.complete(request).await?;
    Ok(TurnOutcome::new(
        response.text,
        response.tool_calls,
        response.finish_reason.unwrap_or(FinishReason::Stop),
    ))
}

/// Streamed turn. Argument previews go to `sink` while calls accumulate.
pub async fn streamed_turn(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
    sink: &StreamSink,
) -> Result<TurnOutcome, ConvertError> {
    let mut chunks = transport.stream(request).await?;
    let mut acc = ToolCallAccumulator::new();
    let mut finish_reason = FinishReason::Stop;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if let Some(reason) = chunk.finish_reason {
            finish_reason = reason;
        }
        if let Some(text) = chunk.text.as_deref() {
            acc.push_text(text);
        }
        for delta in chunk.tool_calls {
            if let Some(event) = acc.push_delta(delta) {
                trace!(tool = %event.tool_name, chars = event.content.len(), "stream preview");
                sink(event);
            }
        }
    }

    let (text, tool_calls) = acc.finish();
    Ok(TurnOutcome::new(text, tool_calls, finish_reason))
}
