//! Tool session traits and the tool catalog.
//!
//! A tool session is a live connection to a process exposing named,
//! schema-described tools (the Unity MCP server). The orchestrator owns one
//! session for the lifetime of a run and closes it exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SessionError, ToolError};
use crate::provider::ToolDefinition;

/// A tool as described by the tool session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema object for the tool's input
    #[serde(default)]
    pub input_schema: serde_json::Map<String, serde_json::Value>,
}

impl ToolDescriptor {
    /// Convert into the shape sent to model endpoints.
    ///
    /// Missing descriptions become empty strings and a schema without a
    /// `type` is declared as an object.
    pub fn to_definition(&self) -> ToolDefinition {
        let mut schema = self.input_schema.clone();
        schema
            .entry("type")
            .or_insert_with(|| serde_json::Value::String("object".into()));

        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            input_schema: serde_json::Value::Object(schema),
        }
    }
}

/// The tools available for one run, keyed by unique name.
///
/// Listing order is preserved so every model call sees the same catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
}

impl ToolCatalog {
    /// Build a catalog from session descriptors. Duplicate names keep the
    /// first occurrence.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let mut tools: Vec<ToolDefinition> = Vec::new();
        for descriptor in descriptors {
            if tools.iter().any(|t| t.name == descriptor.name) {
                warn!(tool = %descriptor.name, "Duplicate tool name in listing, keeping the first");
                continue;
            }
            tools.push(descriptor.to_definition());
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// All tool definitions (for sending to the model).
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// One piece of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
    Image { mime_type: String, bytes: usize },
    Audio { mime_type: String, bytes: usize },
    Resource { uri: String, text: Option<String> },
}

/// Raw output of a tool call, before normalization into a tool result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,

    /// The tool ran but reported failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            structured: None,
            is_error: false,
        }
    }

    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }
}

/// A live connection to a tool-exposing process.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Discover the tools the session exposes.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError>;

    /// Execute one tool call.
    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// Release the session and its transport. Consumes the session so it
    /// can only happen once.
    async fn close(self: Box<Self>);
}

/// Establishes tool sessions. One connector may open many independent
/// sessions, one per orchestrator.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// A short description of the target, for logs.
    fn describe(&self) -> String;

    async fn connect(&self) -> Result<Box<dyn ToolSession>, SessionError>;
}
