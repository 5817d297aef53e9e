//! Shared test helpers: a scripted provider and an in-memory tool session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use unitypilot_core::error::{ProviderError, SessionError, ToolError};
use unitypilot_core::message::ContentBlock;
use unitypilot_core::provider::{CompletionRequest, CompletionResponse, Provider, Usage};
use unitypilot_core::tool::{SessionConnector, ToolDescriptor, ToolOutput, ToolSession};

/// A provider that returns scripted responses in order and records every
/// request it receives. Running out of responses is a provider error.
pub struct ScriptedProvider {
    responses: Mutex<Vec<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
    thinking: bool,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            thinking: false,
            delay: None,
        }
    }

    pub fn with_thinking_support(mut self) -> Self {
        self.thinking = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_extended_thinking(&self) -> bool {
        self.thinking
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            });
        }
        Ok(responses.remove(0))
    }
}

pub fn response(content: Vec<ContentBlock>) -> CompletionResponse {
    let stop_reason = if content.iter().any(|b| b.as_tool_use().is_some()) {
        "tool_use"
    } else {
        "end_turn"
    };
    CompletionResponse {
        content,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
        stop_reason: Some(stop_reason.into()),
    }
}

pub fn text_response(text: &str) -> CompletionResponse {
    response(vec![ContentBlock::text(text)])
}

pub fn tool_response(calls: Vec<(&str, &str, serde_json::Value)>) -> CompletionResponse {
    response(
        calls
            .into_iter()
            .map(|(id, name, input)| ContentBlock::tool_use(id, name, input))
            .collect(),
    )
}

/// Prepend a text block to a scripted response.
pub fn with_text(text: &str, mut resp: CompletionResponse) -> CompletionResponse {
    resp.content.insert(0, ContentBlock::text(text));
    resp
}

#[derive(Default)]
struct SessionStats {
    connects: AtomicUsize,
    closes: AtomicUsize,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

/// In-memory tool session. Tools without a scripted result answer "ok".
#[derive(Clone)]
pub struct MockSession {
    tools: Vec<String>,
    results: HashMap<String, Result<ToolOutput, ToolError>>,
    delays: HashMap<String, Duration>,
    fail_list: bool,
    stats: Arc<SessionStats>,
}

impl MockSession {
    pub fn new(tools: &[&str]) -> Self {
        Self {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            results: HashMap::new(),
            delays: HashMap::new(),
            fail_list: false,
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn respond(mut self, tool: &str, result: Result<ToolOutput, ToolError>) -> Self {
        self.results.insert(tool.to_string(), result);
        self
    }

    pub fn with_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.to_string(), delay);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }
}

#[async_trait]
impl ToolSession for MockSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        if self.fail_list {
            return Err(SessionError::ListTools("server went away".into()));
        }
        Ok(self
            .tools
            .iter()
            .map(|name| ToolDescriptor {
                name: name.clone(),
                description: Some(format!("Mock {name}")),
                input_schema: serde_json::Map::new(),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.stats.calls.lock().unwrap().push((name.to_string(), arguments));
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        self.results
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(ToolOutput::text("ok")))
    }

    async fn close(self: Box<Self>) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out clones of one [`MockSession`] sharing its counters.
pub struct MockConnector {
    template: MockSession,
    fail: bool,
}

impl MockConnector {
    pub fn new(template: MockSession) -> Self {
        Self { template, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            template: MockSession::new(&[]),
            fail: true,
        }
    }

    pub fn connects(&self) -> usize {
        self.template.stats.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.template.stats.closes.load(Ordering::SeqCst)
    }

    pub fn session_calls(&self) -> usize {
        self.template.stats.calls.lock().unwrap().len()
    }

    pub fn recorded_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.template.stats.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    fn describe(&self) -> String {
        "mock-unity-mcp".into()
    }

    async fn connect(&self) -> Result<Box<dyn ToolSession>, SessionError> {
        if self.fail {
            return Err(SessionError::Spawn {
                command: "uv --directory /missing run server.py".into(),
                reason: "No such file or directory".into(),
            });
        }
        self.template.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.clone()))
    }
}
