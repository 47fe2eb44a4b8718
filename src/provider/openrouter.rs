//! OpenRouter (OpenAI-compatible Chat Completions) transport.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::ConverterConfig;
use crate::error::{ConvertError, ErrorCode, ErrorDetails};
use crate::types::*;

use super::http::{openrouter_headers, shared_client, status_to_error};
use super::sse::sse_data_stream;
use super::{ChatRequest, ChatResponse, ChatTransport, ChunkStream};

pub struct OpenRouterTransport {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    referer: String,
    title: String,
}

impl OpenRouterTransport {
    pub fn new(config: &ConverterConfig) -> Result<Self, ConvertError> {
        Ok(Self {
            api_key: config.require_api_key()?.to_string(),
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            max_tokens: config.max_tokens(),
            referer: config.referer().to_string(),
            title: config.title().to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub(crate) fn build_request_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request.messages.iter().map(message_to_wire).collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });
        let Some(obj) = body.as_object_mut() else {
            return body;
        };

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tool_defs.into());
            obj.insert("tool_choice".into(), "auto".into());
        }
        if stream {
            obj.insert("stream".into(), true.into());
        }

        body
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, ConvertError> {
        let resp = shared_client()
            .post(self.url())
            .headers(openrouter_headers(&self.api_key, &self.referer, &self.title))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body_text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatTransport for OpenRouterTransport {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ConvertError> {
        let body = self.build_request_body(request, false);
        debug!(model = %self.model, messages = request.messages.len(), "OpenRouter complete");

        let resp = self.post(&body).await?;
        let text = resp.text().await?;
        let data: ChatCompletionResponse = serde_json::from_str(&text)?;

        if let Some(err) = data.error {
            return Err(err.into_error());
        }

        let choice = data
            .choices
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ConvertError::api(200, "No choices in OpenRouter response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolInvocation {
                id: tc.id,
                name: tc.function.name,
                raw_arguments: tc.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            text: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::parse),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ConvertError> {
        let body = self.build_request_body(request, true);
        debug!(model = %self.model, messages = request.messages.len(), "OpenRouter stream");

        let resp = self.post(&body).await?;
        let mut records = sse_data_stream(resp.bytes_stream());

        let stream = async_stream::stream! {
            while let Some(record) = records.next().await {
                let data = match record {
                    Ok(data) => data,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };
                let chunk: StreamChunkWire = match serde_json::from_str(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        trace!(error = %e, "skipping unparseable stream chunk");
                        continue;
                    }
                };
                if let Some(err) = chunk.error {
                    yield Err(err.into_error());
                    break;
                }
                let Some(choice) = chunk.choices.unwrap_or_default().into_iter().next() else {
                    continue;
                };
                yield Ok(choice.into_chunk());
            }
        };

        Ok(Box::pin(stream))
    }
}

fn message_to_wire(msg: &ChatMessage) -> serde_json::Value {
    let role: &'static str = msg.role.into();
    match msg.role {
        Role::Tool => serde_json::json!({
            "role": role,
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.text(),
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let tool_calls: Vec<serde_json::Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.raw_arguments,
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": role,
                "content": msg.content,
                "tool_calls": tool_calls,
            })
        }
        _ => serde_json::json!({ "role": role, "content": msg.content }),
    }
}

// OpenRouter wire types (internal)

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiErrorBody {
    fn into_error(self) -> ConvertError {
        let status = self
            .code
            .as_ref()
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(200);
        ConvertError::api_with_details(
            status,
            format!("OpenRouter error: {}", self.message),
            ErrorDetails {
                code: Some(ErrorCode::from_status(status)),
                provider_code: self.code.map(|c| c.to_string()),
                request_id: None,
            },
        )
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChoiceWire>>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ChoiceWire {
    message: MessageWire,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessageWire {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallWire>>,
}

#[derive(Deserialize)]
struct ToolCallWire {
    #[serde(default)]
    id: String,
    function: FunctionWire,
}

#[derive(Deserialize)]
struct FunctionWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct StreamChunkWire {
    choices: Option<Vec<StreamChoiceWire>>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct StreamChoiceWire {
    delta: Option<StreamDeltaWire>,
    finish_reason: Option<String>,
}

impl StreamChoiceWire {
    fn into_chunk(self) -> ChatStreamChunk {
        let delta = self.delta.unwrap_or_default();
        ChatStreamChunk {
            text: delta.content,
            tool_calls: delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    let function = tc.function.unwrap_or_default();
                    ToolCallDelta {
                        index: tc.index.unwrap_or(0),
                        id: tc.id.filter(|id| !id.is_empty()),
                        name: function.name.filter(|n| !n.is_empty()),
                        arguments: function.arguments.filter(|a| !a.is_empty()),
                    }
                })
                .collect(),
            finish_reason: self.finish_reason.as_deref().and_then(FinishReason::parse),
        }
    }
}

#[derive(Deserialize, Default)]
struct StreamDeltaWire {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDeltaWire>>,
}

#[derive(Deserialize)]
struct ToolCallDeltaWire {
    index: Option<usize>,
    id: Option<String>,
    function: Option<FunctionDeltaWire>,
}

#[derive(Deserialize, Default)]
struct FunctionDeltaWire {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;

    fn transport() -> OpenRouterTransport {
        OpenRouterTransport::new(&ConverterConfig::new().with_api_key("k").with_model("m")).unwrap()
    }

    #[test]
    fn request_body_carries_tools_and_auto_choice() {
        let request = ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            tools: vec![ToolDefinition {
                name: "add_note".into(),
                description: "note".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        };
        let body = transport().build_request_body(&request, true);
        assert_eq!(body["model"], "m");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 8000);
        assert_eq!(body["tools"][0]["function"]["name"], "add_note");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn assistant_tool_calls_and_results_serialize_for_the_wire() {
        let assistant = ChatMessage::assistant(
            None,
            vec![ToolInvocation::new("call_1", "add_note", r#"{"message":"x"}"#)],
        );
        let wire = message_to_wire(&assistant);
        assert_eq!(wire["role"], "assistant");
        assert!(wire["content"].is_null());
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"message":"x"}"#);

        let result = message_to_wire(&ChatMessage::tool_result("call_1", "OK"));
        assert_eq!(result["tool_call_id"], "call_1");
        assert_eq!(result["content"], "OK");
    }

    #[test]
    fn stream_choice_maps_tool_call_fragments() {
        let wire: StreamChunkWire = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":null,"tool_calls":[{"index":1,"id":"c","function":{"name":"write_file","arguments":"{\"pa"}}]},"finish_reason":null}]}"#,
        )
        .unwrap();
        let chunk = wire.choices.unwrap().into_iter().next().unwrap().into_chunk();
        assert_eq!(chunk.text, None);
        assert_eq!(
            chunk.tool_calls,
            vec![ToolCallDelta {
                index: 1,
                id: Some("c".into()),
                name: Some("write_file".into()),
                arguments: Some("{\"pa".into()),
            }]
        );
    }
}
