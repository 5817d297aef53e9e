//! Provider trait - the abstraction over model endpoints.
//!
//! A Provider knows how to send the system prompt, the conversation and an
//! optional tool catalog to a language model and return the content blocks
//! it produced.
//!
//! Implementations: Anthropic Messages API, OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{ContentBlock, Message, ToolUse};

/// One model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instructions, sent separately from the conversation
    pub system_prompt: String,

    /// The conversation messages, replayed in order
    pub messages: Vec<Message>,

    /// Tools the model may call. `None` withholds tools entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Ask for extended reasoning on this call, if the endpoint supports it
    #[serde(default)]
    pub extended_thinking: bool,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            tools: None,
            extended_thinking: false,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_extended_thinking(mut self, enabled: bool) -> Self {
        self.extended_thinking = enabled;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The outgoing prompt text: the text of the last message.
    ///
    /// Credential providers key their headers on this value.
    pub fn prompt_text(&self) -> String {
        self.messages.last().map(Message::text).unwrap_or_default()
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Text and tool-use blocks in emission order
    pub content: Vec<ContentBlock>,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,

    /// Why generation stopped, as reported by the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentBlock::as_text).collect()
    }

    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        self.content.iter().filter_map(ContentBlock::as_tool_use).collect()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// The core Provider trait.
///
/// Every model endpoint implements this trait. The orchestrator calls
/// `complete()` without knowing which vendor is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "zerog").
    fn name(&self) -> &str;

    /// Whether `extended_thinking` requests are honoured.
    fn supports_extended_thinking(&self) -> bool {
        false
    }

    /// Send a request and get a complete response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}
