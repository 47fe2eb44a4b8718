//! The bounded turn loop driving a conversion.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AgentSettings, ConverterConfig};
use crate::error::ConvertError;
use crate::provider::{self, ChatRequest, ChatTransport, ToolDefinition};
use crate::types::{AgentStep, ChatMessage, ProgressEvent, ProgressSink, StreamSink};

use super::dispatch::dispatch_call;
use super::finalize::finalize;
use super::prompt::{conversion_request, NUDGE, SYSTEM_PROMPT};
use super::state::ConversionState;
use super::tools::conversion_tools;
use super::{ConversionId, ConversionResult, LoopExit};

/// Input to one conversion.
#[derive(Clone)]
pub struct ConvertRequest {
    pub conversion_id: ConversionId,
    pub script: String,
    pub progress: Option<ProgressSink>,
    pub stream: Option<StreamSink>,
    pub cancel: CancellationToken,
}

impl ConvertRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            conversion_id: Uuid::new_v4(),
            script: script.into(),
            progress: None,
            stream: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_stream(mut self, sink: StreamSink) -> Self {
        self.stream = Some(sink);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink(event);
        }
    }
}

/// Converts UserScripts by driving the model through the tool protocol.
#[derive(Clone)]
pub struct AgentConverter {
    transport: Arc<dyn ChatTransport>,
    settings: AgentSettings,
    tools: Vec<ToolDefinition>,
}

impl AgentConverter {
    pub fn new(transport: Arc<dyn ChatTransport>, settings: AgentSettings) -> Self {
        Self {
            transport,
            settings,
            tools: conversion_tools(),
        }
    }

    /// Build a converter on the default transport for `config`.
    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConvertError> {
        let transport: Arc<dyn ChatTransport> = Arc::from(provider::create_transport(config)?);
        Ok(Self::new(transport, config.agent))
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run a conversion to completion.
    ///
    /// Transport failures and cancellation end the conversion immediately.
    /// Otherwise the loop stops on a passing check (or on the first quiet turn
    /// after one when `stop_on_pass` is off), on the fix-round ceiling, or when
    /// turns run out, and the final state is validated.
    pub async fn convert(&self, request: ConvertRequest) -> Result<ConversionResult, ConvertError> {
        let id = request.conversion_id;
        let max_turns = self.settings.max_turns;
        let max_fix_rounds = self.settings.max_fix_rounds;
        info!(conversion_id = %id, transport = self.transport.name(), max_turns, "starting conversion");

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(conversion_request(&request.script)),
        ];
        let mut state = ConversionState::new();
        let mut exit = LoopExit::TurnBudgetExhausted;
        let mut turns = 0;

        for turn in 0..max_turns {
            if request.cancel.is_cancelled() {
                info!(conversion_id = %id, turn, "conversion canceled");
                return Err(ConvertError::Canceled);
            }
            turns = turn + 1;

            let preview = request
                .stream
                .as_ref()
                .filter(|_| turn == 0 && self.settings.stream_first_turn);
            let chat = ChatRequest {
                messages: messages.clone(),
                tools: self.tools.clone(),
            };
            let outcome = super::turn::execute_turn(self.transport.as_ref(), &chat, preview, &request.cancel)
                .await
                .map_err(|e| {
                    warn!(conversion_id = %id, turn, error = %e, "turn failed");
                    e
                })?;
            debug!(
                conversion_id = %id,
                turn,
                tool_calls = outcome.tool_calls.len(),
                finish_reason = %outcome.finish_reason,
                "turn complete"
            );

            let tool_calls = outcome.tool_calls;
            messages.push(outcome.assistant_message);

            if tool_calls.is_empty() {
                if state.check_passed() {
                    exit = LoopExit::IdleAfterPass;
                    break;
                }
                if turn + 1 < max_turns {
                    messages.push(ChatMessage::user(NUDGE));
                    continue;
                }
                exit = LoopExit::TurnBudgetExhausted;
                break;
            }

            for call in &tool_calls {
                messages.push(dispatch_call(&mut state, call, request.progress.as_ref()));
            }

            if state.check_passed() {
                if self.settings.stop_on_pass {
                    exit = LoopExit::CheckPassed;
                    break;
                }
                continue;
            }
            if state.fix_rounds() >= max_fix_rounds && !state.checks().is_empty() {
                state.push_note(format!(
                    "Reached max fix rounds ({max_fix_rounds}) without passing check."
                ));
                exit = LoopExit::FixRoundsExhausted;
                break;
            }
        }

        info!(conversion_id = %id, %exit, turns, files = state.files().count(), "conversion loop finished");
        let result = finalize(state, exit, turns).map_err(|e| {
            warn!(conversion_id = %id, error = %e, "conversion rejected");
            e
        })?;
        request.emit(ProgressEvent::new(AgentStep::Done, ""));
        Ok(result)
    }
}
