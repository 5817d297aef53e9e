//! Tool-result normalization.
//!
//! Renders raw tool output into the text carried by a [`ToolResult`] and
//! folds every failure mode into an error-flagged result, so tool problems
//! reach the model as data.

use unitypilot_core::error::ToolError;
use unitypilot_core::message::ToolResult;
use unitypilot_core::tool::{ToolContent, ToolOutput};

/// Text used when a tool succeeds without producing anything.
pub const EMPTY_OUTPUT: &str = "(no output)";

/// Render tool output as text.
///
/// Content parts are joined by newlines, binary payloads become short
/// placeholders, and structured content is used only when there is no
/// other content.
pub fn render_output(output: &ToolOutput) -> String {
    let parts: Vec<String> = output
        .content
        .iter()
        .map(|part| match part {
            ToolContent::Text { text } => text.clone(),
            ToolContent::Image { mime_type, bytes } => format!("[image: {mime_type}, {bytes} bytes]"),
            ToolContent::Audio { mime_type, bytes } => format!("[audio: {mime_type}, {bytes} bytes]"),
            ToolContent::Resource { text: Some(text), .. } => text.clone(),
            ToolContent::Resource { uri, text: None } => format!("[resource: {uri}]"),
        })
        .filter(|s| !s.is_empty())
        .collect();

    if !parts.is_empty() {
        return parts.join("\n");
    }

    match &output.structured {
        Some(value) if !value.is_null() => value.to_string(),
        _ => EMPTY_OUTPUT.to_string(),
    }
}

/// Build the result for one tool call from its outcome.
pub fn to_tool_result(call_id: &str, outcome: Result<ToolOutput, ToolError>) -> ToolResult {
    match outcome {
        Ok(output) if output.is_error => ToolResult::error(call_id, render_output(&output)),
        Ok(output) => ToolResult::success(call_id, render_output(&output)),
        Err(e) => ToolResult::error(call_id, format!("Error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_parts_are_joined_by_newline() {
        let output = ToolOutput {
            content: vec![
                ToolContent::Text { text: "Created GameObject 'Enemy'".into() },
                ToolContent::Text { text: String::new() },
                ToolContent::Text { text: "Added component Rigidbody".into() },
            ],
            ..ToolOutput::default()
        };
        assert_eq!(render_output(&output), "Created GameObject 'Enemy'\nAdded component Rigidbody");
    }

    #[test]
    fn binary_content_becomes_placeholders() {
        let output = ToolOutput {
            content: vec![
                ToolContent::Image { mime_type: "image/png".into(), bytes: 2048 },
                ToolContent::Resource { uri: "unity://asset/tex".into(), text: None },
                ToolContent::Resource { uri: "unity://scene".into(), text: Some("Main Camera".into()) },
            ],
            ..ToolOutput::default()
        };
        assert_eq!(
            render_output(&output),
            "[image: image/png, 2048 bytes]\n[resource: unity://asset/tex]\nMain Camera"
        );
    }

    #[test]
    fn structured_content_used_only_without_other_content() {
        let structured = ToolOutput {
            structured: Some(serde_json::json!({"objects": 3})),
            ..ToolOutput::default()
        };
        assert_eq!(render_output(&structured), r#"{"objects":3}"#);

        let both = ToolOutput {
            structured: Some(serde_json::json!({"objects": 3})),
            ..ToolOutput::text("3 objects")
        };
        assert_eq!(render_output(&both), "3 objects");

        assert_eq!(render_output(&ToolOutput::default()), EMPTY_OUTPUT);
    }

    #[test]
    fn outcomes_map_to_results() {
        let ok = to_tool_result("c1", Ok(ToolOutput::text("ok")));
        assert_eq!(ok, ToolResult::success("c1", "ok"));

        let reported = to_tool_result("c2", Ok(ToolOutput::error_text("GameObject 'Player' not found")));
        assert!(reported.is_error);
        assert_eq!(reported.content, "GameObject 'Player' not found");

        let failed = to_tool_result(
            "c3",
            Err(ToolError::Timeout {
                tool_name: "manage_scene".into(),
                timeout_secs: 30,
            }),
        );
        assert!(failed.is_error);
        assert_eq!(failed.call_id, "c3");
        assert!(failed.content.starts_with("Error: Tool timed out: manage_scene"));
    }
}
