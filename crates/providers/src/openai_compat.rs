//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, Ollama, vLLM, the 0G compute network and any other
//! endpoint exposing `/chat/completions` with function calling.
//!
//! When configured with a [`CredentialProvider`], headers are resolved for
//! every call from the outgoing prompt text and sent alongside (or instead
//! of) the bearer key. Resolution failure fails the call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unitypilot_core::credentials::CredentialProvider;
use unitypilot_core::error::ProviderError;
use unitypilot_core::message::{ContentBlock, Message};
use unitypilot_core::provider::*;

use crate::credentials::to_header_map;
use crate::http;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
    temperature: Option<f32>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            client: http::build_client(timeout)?,
            temperature: None,
            credentials: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Resolve per-request headers through `credentials` for every call.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Convert our Message types to OpenAI API format.
    ///
    /// Each tool result becomes its own `tool` role message.
    fn to_api_messages(system_prompt: &str, messages: &[Message]) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);

        if !system_prompt.is_empty() {
            out.push(ApiMessage::text("system", system_prompt));
        }

        for msg in messages {
            match msg {
                Message::User { text } => out.push(ApiMessage::text("user", text)),
                Message::Assistant { content } => {
                    let text: String = content.iter().filter_map(ContentBlock::as_text).collect();
                    let tool_calls: Vec<ApiToolCall> = msg
                        .tool_uses()
                        .into_iter()
                        .map(|call| ApiToolCall {
                            id: call.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: call.name.clone(),
                                arguments: call.input.to_string(),
                            },
                        })
                        .collect();
                    if text.is_empty() && tool_calls.is_empty() {
                        continue;
                    }
                    out.push(ApiMessage {
                        role: "assistant".into(),
                        content: (!text.is_empty()).then_some(text),
                        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                        tool_call_id: None,
                    });
                }
                Message::ToolResults { results } => {
                    out.extend(results.iter().map(|r| ApiMessage {
                        role: "tool".into(),
                        content: Some(r.content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(r.call_id.clone()),
                    }));
                }
            }
        }

        out
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect()
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request.system_prompt, &request.messages),
            "stream": false,
        });

        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(tools) = request.tools.as_deref().filter(|t| !t.is_empty()) {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
        }

        body
    }

    fn to_completion_response(api_response: ApiResponse) -> Result<CompletionResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::text(text));
        }
        for tc in choice.message.tool_calls.unwrap_or_default() {
            let input = parse_arguments(&tc.function.name, &tc.function.arguments);
            content.push(ContentBlock::tool_use(tc.id, tc.function.name, input));
        }

        Ok(CompletionResponse {
            content,
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api_response.model,
            stop_reason: choice.finish_reason,
        })
    }
}

/// Function arguments arrive as a JSON string. Unparseable arguments are
/// passed through as a string so the tool can reject them.
fn parse_arguments(tool: &str, arguments: &str) -> serde_json::Value {
    if arguments.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(arguments).unwrap_or_else(|e| {
        warn!(tool, error = %e, "Tool call arguments are not valid JSON");
        serde_json::Value::String(arguments.to_string())
    })
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        if let Some(credentials) = &self.credentials {
            let headers = credentials.resolve(&request.prompt_text()).await?;
            builder = builder.headers(to_header_map(&headers)?);
        }

        debug!(
            provider = %self.name,
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Sending completion request"
        );

        let response = builder.send().await.map_err(|e| http::send_error(&self.name, e))?;
        let response = http::check_status(&self.name, response).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::to_completion_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use unitypilot_core::credentials::Headers;
    use unitypilot_core::error::CredentialError;
    use unitypilot_core::message::ToolResult;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("zerog", "http://127.0.0.1:9/v1/", "llama-3.3-70b", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_is_trimmed_and_empty_key_ignored() {
        let provider = provider().with_api_key("");
        assert_eq!(provider.base_url, "http://127.0.0.1:9/v1");
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            Message::user("Turn the player object red"),
            Message::assistant(vec![ContentBlock::tool_use(
                "call_1",
                "set_color",
                serde_json::json!({"object": "Player", "color": "red"}),
            )]),
            Message::tool_results(vec![
                ToolResult::success("call_1", "Player is now red"),
            ]),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages("You are a Unity expert", &messages);
        assert_eq!(api_messages.len(), 4);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[2].role, "assistant");
        assert!(api_messages[2].content.is_none());
        let call = &api_messages[2].tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.function.name, "set_color");
        let args: serde_json::Value = serde_json::from_str(&call.function.arguments).unwrap();
        assert_eq!(args["color"], "red");
        assert_eq!(api_messages[3].role, "tool");
        assert_eq!(api_messages[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn one_tool_message_per_result() {
        let messages = vec![Message::tool_results(vec![
            ToolResult::success("a", "ok"),
            ToolResult::error("b", "Error: not found"),
        ])];
        let api_messages = OpenAiCompatProvider::to_api_messages("", &messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[1].content.as_deref(), Some("Error: not found"));
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "manage_scene".into(),
            description: "Load, save and query scenes".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "manage_scene");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn body_withholds_tools_when_none() {
        let request = CompletionRequest::new("s", vec![Message::user("hi")]);
        let body = provider().request_body(&request);
        assert!(body.get("tools").is_none());
        assert_eq!(body["model"], "llama-3.3-70b");

        let with_tools = request.with_tools(vec![ToolDefinition {
            name: "read_console".into(),
            description: String::new(),
            input_schema: serde_json::json!({"type": "object"}),
        }]);
        let body = provider().request_body(&with_tools);
        assert_eq!(body["tools"][0]["function"]["name"], "read_console");
    }

    #[test]
    fn parse_response_with_text_and_tool_calls() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "Recoloring now.",
                        "tool_calls": [
                            {"id": "call_a", "type": "function", "function": {"name": "set_color", "arguments": "{\"color\":\"red\"}"}},
                            {"id": "call_b", "type": "function", "function": {"name": "save_scene", "arguments": ""}}
                        ]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
            }"#,
        )
        .unwrap();

        let resp = OpenAiCompatProvider::to_completion_response(resp).unwrap();
        assert_eq!(resp.content.len(), 3);
        assert_eq!(resp.text(), "Recoloring now.");
        let calls = resp.tool_uses();
        assert_eq!(calls[0].input["color"], "red");
        assert_eq!(calls[1].input, serde_json::json!({}));
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_calls"));
        assert_eq!(resp.usage.unwrap().total_tokens, 20);
    }

    #[test]
    fn parse_response_without_choices_is_invalid() {
        let resp: ApiResponse = serde_json::from_str(r#"{"model": "m", "choices": []}"#).unwrap();
        assert!(matches!(
            OpenAiCompatProvider::to_completion_response(resp),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn malformed_arguments_pass_through_as_string() {
        assert_eq!(parse_arguments("t", "{oops"), serde_json::json!("{oops"));
    }

    struct FailingCredentials {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CredentialProvider for FailingCredentials {
        async fn resolve(&self, prompt: &str) -> Result<Headers, CredentialError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            Err(CredentialError::Rejected {
                status: 403,
                message: "unknown provider".into(),
            })
        }
    }

    #[tokio::test]
    async fn credential_failure_fails_the_call() {
        let credentials = Arc::new(FailingCredentials { calls: Mutex::new(Vec::new()) });
        let provider = provider().with_credentials(credentials.clone());

        let err = provider
            .complete(CompletionRequest::new("s", vec![Message::user("Turn the player object red")]))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Credentials(CredentialError::Rejected { status: 403, .. })));
        assert_eq!(*credentials.calls.lock().unwrap(), ["Turn the player object red"]);
    }

    /// Signs every prompt with a header derived from its length.
    struct SigningCredentials {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CredentialProvider for SigningCredentials {
        async fn resolve(&self, prompt: &str) -> Result<Headers, CredentialError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            Ok(vec![("x-sig".into(), format!("sig-{}", prompt.len()))])
        }
    }

    #[tokio::test]
    async fn resolved_headers_reach_the_endpoint_on_every_call() {
        use axum::extract::State;
        use axum::http::HeaderMap;
        use axum::routing::post;
        use axum::{Json, Router};

        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(|State(seen): State<Arc<Mutex<Vec<String>>>>, headers: HeaderMap| async move {
                    let signature = headers
                        .get("x-sig")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push(signature);
                    Json(serde_json::json!({
                        "model": "llama-3.3-70b",
                        "choices": [{
                            "message": {"role": "assistant", "content": "The player is red."},
                            "finish_reason": "stop"
                        }]
                    }))
                }),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let credentials = Arc::new(SigningCredentials { calls: Mutex::new(Vec::new()) });
        let provider = OpenAiCompatProvider::new(
            "zerog",
            format!("http://{addr}/v1"),
            "llama-3.3-70b",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_credentials(credentials.clone());

        for _ in 0..2 {
            let response = provider
                .complete(CompletionRequest::new("s", vec![Message::user("hello")]))
                .await
                .unwrap();
            assert_eq!(response.text(), "The player is red.");
        }

        assert_eq!(*credentials.calls.lock().unwrap(), ["hello", "hello"]);
        assert_eq!(*seen.lock().unwrap(), ["sig-5", "sig-5"]);
    }
}
