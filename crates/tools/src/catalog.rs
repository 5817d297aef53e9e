//! Conversions from MCP wire types into the domain tool types.

use rmcp::model::{CallToolResult, Content, RawContent, ResourceContents, Tool};
use unitypilot_core::tool::{ToolContent, ToolDescriptor, ToolOutput};

/// Map one listed MCP tool to a descriptor.
pub fn descriptor_from_mcp(tool: Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: (*tool.input_schema).clone(),
    }
}

/// Map an MCP call result to tool output.
///
/// Structured content is kept alongside the content blocks; the normalizer
/// decides whether to render it.
pub fn output_from_mcp(result: CallToolResult) -> ToolOutput {
    ToolOutput {
        content: result.content.into_iter().map(content_from_mcp).collect(),
        structured: result.structured_content,
        is_error: result.is_error.unwrap_or(false),
    }
}

fn content_from_mcp(content: Content) -> ToolContent {
    match content.raw {
        RawContent::Text(text) => ToolContent::Text { text: text.text },
        RawContent::Image(image) => ToolContent::Image {
            bytes: decoded_len(&image.data),
            mime_type: image.mime_type,
        },
        RawContent::Audio(audio) => ToolContent::Audio {
            bytes: decoded_len(&audio.data),
            mime_type: audio.mime_type,
        },
        RawContent::Resource(resource) => match resource.resource {
            ResourceContents::TextResourceContents { uri, text, .. } => ToolContent::Resource { uri, text: Some(text) },
            ResourceContents::BlobResourceContents { uri, .. } => ToolContent::Resource { uri, text: None },
        },
        RawContent::ResourceLink(link) => ToolContent::Resource {
            uri: link.uri,
            text: None,
        },
    }
}

/// Approximate decoded size of a base64 payload.
fn decoded_len(base64: &str) -> usize {
    let padding = base64.bytes().rev().take_while(|b| *b == b'=').count();
    (base64.len() / 4 * 3).saturating_sub(padding)
}
