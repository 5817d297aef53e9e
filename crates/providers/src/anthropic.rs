//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Extended thinking on request; thinking blocks are not returned

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use unitypilot_core::error::ProviderError;
use unitypilot_core::message::{ContentBlock, Message};
use unitypilot_core::provider::*;

use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    temperature: Option<f32>,
    /// Budget tokens for extended thinking; `None` disables it.
    thinking_budget: Option<u32>,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            client: http::build_client(timeout)?,
            temperature: None,
            thinking_budget: None,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Allow extended thinking with the given token budget.
    pub fn with_extended_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking_budget = Some(budget_tokens);
        self
    }

    /// Convert messages to Anthropic API format with content blocks.
    ///
    /// Tool results travel as user-role turns, so a tool-results message
    /// followed by a user message is merged into one turn. Assistant messages
    /// without any blocks are skipped.
    fn to_api_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            let (role, blocks) = match msg {
                Message::User { text } => ("user", vec![ApiBlock::Text { text: text.clone() }]),
                Message::Assistant { content } => {
                    let blocks: Vec<ApiBlock> = content
                        .iter()
                        .filter_map(|block| match block {
                            ContentBlock::Text { text } if text.is_empty() => None,
                            ContentBlock::Text { text } => Some(ApiBlock::Text { text: text.clone() }),
                            ContentBlock::ToolUse(call) => Some(ApiBlock::ToolUse {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                input: call.input.clone(),
                            }),
                        })
                        .collect();
                    if blocks.is_empty() {
                        continue;
                    }
                    ("assistant", blocks)
                }
                Message::ToolResults { results } => (
                    "user",
                    results
                        .iter()
                        .map(|r| ApiBlock::ToolResult {
                            tool_use_id: r.call_id.clone(),
                            content: r.content.clone(),
                            is_error: r.is_error,
                        })
                        .collect(),
                ),
            };

            match result.last_mut() {
                Some(last) if last.role == role => last.content.extend(blocks),
                _ => result.push(AnthropicMessage {
                    role: role.into(),
                    content: AnthropicContent::Blocks(blocks),
                }),
            }
        }

        for msg in &mut result {
            msg.content.simplify();
        }
        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request.messages),
        });

        if !request.system_prompt.is_empty() {
            body["system"] = serde_json::json!(request.system_prompt);
        }

        if let Some(tools) = request.tools.as_deref().filter(|t| !t.is_empty()) {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
        }

        match self.thinking_budget {
            Some(budget) if request.extended_thinking => {
                // Thinking requires max_tokens above the budget and no temperature.
                if max_tokens <= budget {
                    max_tokens += budget;
                }
                body["thinking"] = serde_json::json!({
                    "type": "enabled",
                    "budget_tokens": budget
                });
            }
            _ => {
                if let Some(t) = self.temperature {
                    body["temperature"] = serde_json::json!(t);
                }
            }
        }

        body["max_tokens"] = serde_json::json!(max_tokens);
        body
    }

    /// Convert Anthropic API response to our CompletionResponse.
    fn to_completion_response(resp: AnthropicResponse) -> CompletionResponse {
        let content = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(ContentBlock::text(text)),
                ResponseContentBlock::ToolUse { id, name, input } => Some(ContentBlock::tool_use(id, name, input)),
                ResponseContentBlock::Thinking { thinking } => {
                    trace!(chars = thinking.len(), "Dropping thinking block");
                    None
                }
                ResponseContentBlock::Other => None,
            })
            .collect();

        CompletionResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
            model: resp.model,
            stop_reason: resp.stop_reason,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_extended_thinking(&self) -> bool {
        self.thinking_budget.is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(&request);

        debug!(
            provider = "anthropic",
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            thinking = body.get("thinking").is_some(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(&self.name, e))?;

        let response = http::check_status(&self.name, response).await?;

        let api_resp: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse Anthropic response: {e}")))?;

        Ok(Self::to_completion_response(api_resp))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ApiBlock>),
}

impl AnthropicContent {
    fn extend(&mut self, more: Vec<ApiBlock>) {
        match self {
            Self::Blocks(blocks) => blocks.extend(more),
            Self::Text(text) => {
                let mut blocks = vec![ApiBlock::Text { text: std::mem::take(text) }];
                blocks.extend(more);
                *self = Self::Blocks(blocks);
            }
        }
    }

    /// A lone text block is sent as a plain string.
    fn simplify(&mut self) {
        if let Self::Blocks(blocks) = self
            && let [ApiBlock::Text { text }] = blocks.as_slice()
        {
            *self = Self::Text(text.clone());
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ApiBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "thinking")]
    Thinking { thinking: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitypilot_core::message::ToolResult;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("sk-ant-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn constructor() {
        let provider = provider();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model, DEFAULT_MODEL);
        assert!(!provider.supports_extended_thinking());
    }

    #[test]
    fn constructor_with_base_url() {
        let provider = provider().with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn message_conversion_user_assistant() {
        let messages = vec![
            Message::user("Hello"),
            Message::assistant(vec![ContentBlock::text("Hi!")]),
        ];
        let api_msgs = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(api_msgs.len(), 2);
        assert_eq!(api_msgs[0].role, "user");
        assert!(matches!(&api_msgs[0].content, AnthropicContent::Text(t) if t == "Hello"));
        assert_eq!(api_msgs[1].role, "assistant");
    }

    #[test]
    fn message_conversion_with_tool_use_and_result() {
        let messages = vec![
            Message::user("Turn the player object red"),
            Message::assistant(vec![
                ContentBlock::text("Let me recolor it"),
                ContentBlock::tool_use("toolu_123", "set_color", serde_json::json!({"object": "Player", "color": "red"})),
            ]),
            Message::tool_results(vec![ToolResult::error("toolu_123", "Material is read-only")]),
        ];

        let api_msgs = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(api_msgs.len(), 3);

        match &api_msgs[1].content {
            AnthropicContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                match &blocks[1] {
                    ApiBlock::ToolUse { id, name, input } => {
                        assert_eq!(id, "toolu_123");
                        assert_eq!(name, "set_color");
                        assert_eq!(input["color"], "red");
                    }
                    other => panic!("Expected tool_use block, got {other:?}"),
                }
            }
            other => panic!("Expected blocks content, got {other:?}"),
        }

        // Tool results go as user messages
        assert_eq!(api_msgs[2].role, "user");
        let json = serde_json::to_value(&api_msgs[2]).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_use_id"], "toolu_123");
        assert_eq!(json["content"][0]["is_error"], true);
    }

    #[test]
    fn tool_results_and_following_user_turn_are_merged() {
        let messages = vec![
            Message::user("Build a level"),
            Message::assistant(vec![ContentBlock::tool_use("t1", "manage_scene", serde_json::json!({}))]),
            Message::tool_results(vec![ToolResult::success("t1", "ok")]),
            Message::user("Summarize what you accomplished."),
        ];
        let api_msgs = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(api_msgs.len(), 3);
        let json = serde_json::to_value(&api_msgs[2]).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][1]["type"], "text");
        assert!(json["content"][0].get("is_error").is_none());
    }

    #[test]
    fn empty_assistant_message_is_skipped() {
        let messages = vec![
            Message::user("Hello"),
            Message::assistant(vec![ContentBlock::text("")]),
            Message::user("Again"),
        ];
        let api_msgs = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(api_msgs.len(), 1);
        let json = serde_json::to_value(&api_msgs[0]).unwrap();
        assert_eq!(json["content"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "manage_gameobject".into(),
            description: "Create or modify GameObjects".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "name": {"type": "string"} },
                "required": ["name"]
            }),
        }];
        let api_tools = AnthropicProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].name, "manage_gameobject");
        assert_eq!(api_tools[0].input_schema["type"].as_str(), Some("object"));
    }

    #[test]
    fn body_omits_tools_when_withheld() {
        let provider = provider().with_temperature(Some(0.2));
        let request = CompletionRequest::new("You are a Unity expert", vec![Message::user("hi")]);
        let body = provider.request_body(&request);
        assert!(body.get("tools").is_none());
        assert_eq!(body["system"], "You are a Unity expert");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert!(body.get("temperature").is_some());
    }

    #[test]
    fn body_enables_thinking_only_on_request() {
        let provider = provider().with_temperature(Some(0.2)).with_extended_thinking(2048);
        assert!(provider.supports_extended_thinking());

        let plain = CompletionRequest::new("s", vec![Message::user("hi")]);
        let body = provider.request_body(&plain);
        assert!(body.get("thinking").is_none());

        let thinking = plain.clone().with_extended_thinking(true).with_max_tokens(Some(1024));
        let body = provider.request_body(&thinking);
        assert_eq!(body["thinking"]["budget_tokens"], 2048);
        assert!(body["max_tokens"].as_u64().unwrap() > 2048);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn parse_text_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "model": "claude-3-7-sonnet-20250219",
                "content": [{"type": "text", "text": "Hello!"}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();

        let resp = AnthropicProvider::to_completion_response(resp);
        assert_eq!(resp.text(), "Hello!");
        assert!(resp.tool_uses().is_empty());
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn parse_tool_use_response_keeps_order() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_02",
                "model": "claude-3-7-sonnet-20250219",
                "content": [
                    {"type": "text", "text": "Recoloring"},
                    {"type": "tool_use", "id": "toolu_a", "name": "set_color", "input": {"color": "red"}},
                    {"type": "tool_use", "id": "toolu_b", "name": "save_scene", "input": {}}
                ],
                "usage": {"input_tokens": 20, "output_tokens": 10},
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();

        let resp = AnthropicProvider::to_completion_response(resp);
        assert_eq!(resp.content.len(), 3);
        let ids: Vec<_> = resp.tool_uses().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["toolu_a", "toolu_b"]);
        assert_eq!(resp.tool_uses()[0].input["color"], "red");
    }

    #[test]
    fn parse_thinking_response_drops_thinking() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_03",
                "model": "claude-3-7-sonnet-20250219",
                "content": [
                    {"type": "thinking", "thinking": "I need to consider...", "signature": "abc"},
                    {"type": "redacted_thinking", "data": "xyz"},
                    {"type": "text", "text": "Here's my answer."}
                ],
                "usage": {"input_tokens": 15, "output_tokens": 25}
            }"#,
        )
        .unwrap();

        let resp = AnthropicProvider::to_completion_response(resp);
        assert_eq!(resp.content, vec![ContentBlock::text("Here's my answer.")]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let provider = provider().with_base_url("http://127.0.0.1:9");
        let err = provider
            .complete(CompletionRequest::new("s", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_) | ProviderError::Timeout(_)));
    }
}
