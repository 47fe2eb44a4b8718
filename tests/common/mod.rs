//! Shared test helpers and a scripted transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use script2ext::error::ConvertError;
use script2ext::provider::{ChatRequest, ChatResponse, ChatTransport, ChunkStream};
use script2ext::types::*;

/// One scripted turn.
pub enum Scripted {
    Response(ChatResponse),
    Chunks(Vec<ChatStreamChunk>),
    Fail(ConvertError),
    /// Never answers; only cancellation ends the turn.
    Hang,
}

/// A transport that replays queued turns and records every request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    turns: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    streamed: Arc<Mutex<Vec<bool>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, turn: Scripted) -> &Self {
        self.turns.lock().unwrap().push_back(turn);
        self
    }

    /// Queue a blocking turn answering with the given tool calls.
    pub fn push_calls(&self, calls: Vec<ToolInvocation>) -> &Self {
        self.push(Scripted::Response(ChatResponse {
            text: None,
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolCalls),
        }))
    }

    /// Queue a blocking turn answering with plain text.
    pub fn push_text(&self, text: &str) -> &Self {
        self.push(Scripted::Response(ChatResponse {
            text: Some(text.to_string()),
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
        }))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether each recorded request went through the streaming path.
    pub fn streamed(&self) -> Vec<bool> {
        self.streamed.lock().unwrap().clone()
    }

    pub fn as_transport(&self) -> Arc<dyn ChatTransport> {
        Arc::new(self.clone())
    }

    fn next(&self, request: &ChatRequest, streamed: bool) -> Option<Scripted> {
        self.requests.lock().unwrap().push(request.clone());
        self.streamed.lock().unwrap().push(streamed);
        self.turns.lock().unwrap().pop_front()
    }
}

fn idle() -> ChatResponse {
    ChatResponse {
        text: Some("done".to_string()),
        tool_calls: Vec::new(),
        finish_reason: Some(FinishReason::Stop),
    }
}

fn as_chunks(response: ChatResponse) -> Vec<ChatStreamChunk> {
    let mut chunks = vec![ChatStreamChunk {
        text: response.text,
        ..Default::default()
    }];
    for (index, call) in response.tool_calls.into_iter().enumerate() {
        chunks.push(ChatStreamChunk {
            tool_calls: vec![ToolCallDelta {
                index,
                id: Some(call.id),
                name: Some(call.name),
                arguments: Some(call.raw_arguments),
            }],
            ..Default::default()
        });
    }
    chunks.push(ChatStreamChunk {
        finish_reason: response.finish_reason,
        ..Default::default()
    });
    chunks
}

fn collect_response(chunks: Vec<ChatStreamChunk>) -> ChatResponse {
    let mut response = ChatResponse::default();
    let mut text = String::new();
    for chunk in chunks {
        if let Some(t) = chunk.text {
            text.push_str(&t);
        }
        for delta in chunk.tool_calls {
            while response.tool_calls.len() <= delta.index {
                response.tool_calls.push(ToolInvocation::default());
            }
            let call = &mut response.tool_calls[delta.index];
            if let Some(id) = delta.id {
                call.id = id;
            }
            if let Some(name) = delta.name {
                call.name = name;
            }
            if let Some(args) = delta.arguments {
                call.raw_arguments.push_str(&args);
            }
        }
        if chunk.finish_reason.is_some() {
            response.finish_reason = chunk.finish_reason;
        }
    }
    response.text = Some(text).filter(|t| !t.is_empty());
    response
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ConvertError> {
        match self.next(request, false) {
            None => Ok(idle()),
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Chunks(chunks)) => Ok(collect_response(chunks)),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Hang) => futures::future::pending().await,
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ConvertError> {
        let chunks = match self.next(request, true) {
            None => as_chunks(idle()),
            Some(Scripted::Response(response)) => as_chunks(response),
            Some(Scripted::Chunks(chunks)) => chunks,
            Some(Scripted::Fail(err)) => return Err(err),
            Some(Scripted::Hang) => futures::future::pending().await,
        };
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

/// Build a tool call with JSON arguments.
pub fn call(id: &str, name: &str, args: Value) -> ToolInvocation {
    ToolInvocation::new(id, name, args.to_string())
}

pub fn write_file(id: &str, path: &str, content: &str, kind: &str) -> ToolInvocation {
    call(
        id,
        "write_file",
        serde_json::json!({ "path": path, "content": content, "kind": kind, "required": true }),
    )
}

pub fn run_check(id: &str, pass: bool, summary: &str) -> ToolInvocation {
    call(
        id,
        "run_check",
        serde_json::json!({ "pass": pass, "summary": summary, "issues": [] }),
    )
}

pub fn apply_fix(id: &str, summary: &str) -> ToolInvocation {
    call(id, "apply_fix", serde_json::json!({ "summary": summary }))
}

pub fn core_files(prefix: &str) -> Vec<ToolInvocation> {
    vec![
        write_file(
            &format!("{prefix}-m"),
            "manifest.json",
            r#"{"manifest_version":3,"name":"Demo","version":"1.0"}"#,
            "manifest",
        ),
        write_file(&format!("{prefix}-c"), "content.js", "console.log('hi');", "content"),
    ]
}

pub const SAMPLE_SCRIPT: &str = "// ==UserScript==\n\
// @name        Demo\n\
// @version     1.0\n\
// @match       https://example.com/*\n\
// @grant       GM_addStyle\n\
// ==/UserScript==\n\
GM_addStyle('body { color: red; }');\n";
