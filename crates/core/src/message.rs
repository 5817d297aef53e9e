//! Message and Conversation domain types.
//!
//! These are the values that flow through the orchestration loop:
//! the user's query opens a conversation, the model answers with content
//! blocks, and tool results are folded back in as their own message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a conversation that may be continued across queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A model-issued request to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// Call ID, echoed back in the matching [`ToolResult`]
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON value
    pub input: serde_json::Value,
}

/// One block of assistant output, kept in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse(ToolUse),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolUse(ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ToolUse(_) => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            Self::ToolUse(call) => Some(call),
            Self::Text { .. } => None,
        }
    }
}

/// The outcome of one tool call, correlated to its [`ToolUse`] by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,

    /// Normalized output text, or the error text when `is_error` is set
    pub content: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: message.into(),
            is_error: true,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Text typed by the end user (or an instruction injected on their behalf)
    User { text: String },

    /// Model output: text and tool calls, interleaved as emitted
    Assistant { content: Vec<ContentBlock> },

    /// Results for every tool call of the preceding assistant message.
    /// Sent to the model as a user-role turn.
    ToolResults { results: Vec<ToolResult> },
}

impl Message {
    /// Create a new user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    /// Create an assistant message from content blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::Assistant { content }
    }

    /// Create a tool results message.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::ToolResults { results }
    }

    /// Tool calls requested by this message (empty unless assistant).
    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        match self {
            Self::Assistant { content } => content.iter().filter_map(ContentBlock::as_tool_use).collect(),
            _ => Vec::new(),
        }
    }

    /// The plain-text view of this message.
    ///
    /// Assistant text blocks are concatenated; tool results are joined by
    /// newlines.
    pub fn text(&self) -> String {
        match self {
            Self::User { text } => text.clone(),
            Self::Assistant { content } => content.iter().filter_map(ContentBlock::as_text).collect(),
            Self::ToolResults { results } => results
                .iter()
                .map(|r| r.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// An append-only sequence of messages with shared context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Session this conversation belongs to
    pub id: SessionId,

    /// Ordered messages
    messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation with a fresh session id.
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    /// Create an empty conversation for a known session.
    pub fn with_id(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message. Messages are never reordered or edited in place.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Turn the player object red");
        assert_eq!(msg.text(), "Turn the player object red");
        assert!(msg.tool_uses().is_empty());
    }

    #[test]
    fn assistant_tool_uses_keep_emission_order() {
        let msg = Message::assistant(vec![
            ContentBlock::text("Looking up the scene. "),
            ContentBlock::tool_use("call_1", "get_hierarchy", serde_json::json!({})),
            ContentBlock::text("Then recoloring."),
            ContentBlock::tool_use("call_2", "set_color", serde_json::json!({"color": "red"})),
        ]);
        let ids: Vec<_> = msg.tool_uses().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["call_1", "call_2"]);
        assert_eq!(msg.text(), "Looking up the scene. Then recoloring.");
    }

    #[test]
    fn conversation_is_append_only() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        conv.push(Message::assistant(vec![ContentBlock::text("Reply")]));
        assert_eq!(conv.len(), 2);
        assert!(matches!(conv.messages()[0], Message::User { .. }));
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn message_serialization_is_tagged() {
        let msg = Message::tool_results(vec![ToolResult::error("call_1", "boom")]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool_results");
        assert_eq!(json["results"][0]["is_error"], true);

        let block = ContentBlock::tool_use("call_1", "set_color", serde_json::json!({"object": "player"}));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "set_color");
    }

    #[test]
    fn successful_result_omits_error_flag() {
        let json = serde_json::to_string(&ToolResult::success("call_1", "ok")).unwrap();
        assert!(!json.contains("is_error"));
    }
}
