//! The tool-calling orchestrator.
//!
//! One orchestrator owns one tool session. A query runs as a bounded loop:
//! call the model with the tool catalog, execute any tool calls it makes,
//! fold the results back into the conversation, and repeat until the model
//! answers without tools or the turn budget runs out. On budget exhaustion a
//! final call without tools asks the model to summarize.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use unitypilot_config::{AgentConfig, DEFAULT_SYSTEM_PROMPT, ModelConfig, TextRetention};
use unitypilot_core::error::{Error, ProviderError, ToolError};
use unitypilot_core::message::{ContentBlock, Conversation, Message, ToolResult, ToolUse};
use unitypilot_core::provider::{CompletionRequest, CompletionResponse, Provider, Usage};
use unitypilot_core::tool::{SessionConnector, ToolCatalog, ToolSession};

use crate::normalize;

/// Instruction appended when the turn budget is spent.
pub const SUMMARY_INSTRUCTION: &str = "You have reached the maximum number of tool-calling turns for this request. \
Do not call any more tools. Summarize what has been done so far and what, if anything, remains.";

/// What one query produced.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// The user-facing answer
    pub answer: String,

    /// Model calls made, including the summary call
    pub model_calls: usize,

    /// Tool calls executed
    pub tool_calls: usize,

    /// Whether the turn budget ran out
    pub budget_exhausted: bool,

    /// Tokens used across all model calls
    pub usage: Usage,
}

struct ActiveSession {
    session: Box<dyn ToolSession>,
    catalog: ToolCatalog,
}

/// Drives the model/tool loop over one tool session.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    connector: Arc<dyn SessionConnector>,
    session: Option<ActiveSession>,

    /// Default system prompt for callers without their own
    system_prompt: String,

    /// Default turn budget
    max_turns: usize,

    max_tokens: Option<u32>,
    extended_thinking: bool,
    parallel_tool_calls: bool,
    text_retention: TextRetention,
    model_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            provider,
            connector,
            session: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: 10,
            max_tokens: None,
            extended_thinking: false,
            parallel_tool_calls: false,
            text_retention: TextRetention::default(),
            model_timeout: None,
            tool_timeout: None,
        }
    }

    /// Apply agent and model settings from configuration.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        connector: Arc<dyn SessionConnector>,
        agent: &AgentConfig,
        model: &ModelConfig,
    ) -> Self {
        Self::new(provider, connector)
            .with_system_prompt(agent.system_prompt())
            .with_max_turns(agent.max_turns)
            .with_max_tokens(model.max_tokens)
            .with_extended_thinking(model.extended_thinking)
            .with_parallel_tool_calls(agent.parallel_tool_calls)
            .with_text_retention(agent.text_retention)
            .with_model_timeout(agent.model_timeout_secs.map(Duration::from_secs))
            .with_tool_timeout(agent.tool_timeout_secs.map(Duration::from_secs))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_turns(mut self, max: usize) -> Self {
        self.max_turns = max;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Request extended reasoning on the first model call of each query.
    pub fn with_extended_thinking(mut self, enabled: bool) -> Self {
        self.extended_thinking = enabled;
        self
    }

    /// Execute the tool calls of one assistant message concurrently.
    pub fn with_parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    pub fn with_text_retention(mut self, retention: TextRetention) -> Self {
        self.text_retention = retention;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// The tool catalog discovered at initialization.
    pub fn catalog(&self) -> Option<&ToolCatalog> {
        self.session.as_ref().map(|active| &active.catalog)
    }

    /// Open the tool session and discover its tools.
    ///
    /// Calling this on an initialized orchestrator is a no-op. If listing
    /// fails the half-open session is closed before the error is returned.
    pub async fn initialize(&mut self) -> Result<(), Error> {
        if self.session.is_some() {
            debug!("Tool session already initialized");
            return Ok(());
        }

        let target = self.connector.describe();
        let session = self.connector.connect().await?;

        let descriptors = match session.list_tools().await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!(target = %target, error = %e, "Tool listing failed, closing session");
                session.close().await;
                return Err(Error::Initialization(e));
            }
        };

        let catalog = ToolCatalog::from_descriptors(descriptors);
        info!(target = %target, tools = catalog.len(), "Tool session initialized");
        self.session = Some(ActiveSession { session, catalog });
        Ok(())
    }

    /// Answer one standalone query.
    pub async fn process_query(&self, query: &str, system_prompt: &str, max_turns: usize) -> Result<String, Error> {
        let mut conversation = Conversation::new();
        let outcome = self.run(&mut conversation, query, system_prompt, max_turns).await?;
        Ok(outcome.answer)
    }

    /// Answer a query as the next turn of an existing conversation.
    pub async fn continue_query(
        &self,
        conversation: &mut Conversation,
        query: &str,
        system_prompt: &str,
        max_turns: usize,
    ) -> Result<QueryOutcome, Error> {
        self.run(conversation, query, system_prompt, max_turns).await
    }

    /// Run the model/tool loop for `query` on top of `conversation`.
    ///
    /// Messages are committed per completed turn: an assistant message is
    /// appended together with the results of all its tool calls, never alone.
    /// The query itself is held back until the first model call succeeds, so
    /// a failed model call leaves the conversation at the last complete turn.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        query: &str,
        system_prompt: &str,
        max_turns: usize,
    ) -> Result<QueryOutcome, Error> {
        let active = self.session.as_ref().ok_or(Error::NotInitialized)?;
        let tools = active.catalog.definitions().to_vec();
        let thinking = self.extended_thinking && self.provider.supports_extended_thinking();

        info!(
            session_id = %conversation.id,
            messages = conversation.len(),
            tools = tools.len(),
            max_turns,
            "Processing query"
        );

        let mut pending = Some(Message::user(query));

        let mut fragments: Vec<String> = Vec::new();
        let mut usage = Usage::default();
        let mut model_calls = 0;
        let mut tool_calls = 0;
        let mut finished = false;

        for iteration in 0..max_turns {
            let request = CompletionRequest::new(system_prompt, outgoing(conversation, pending.as_ref()))
                .with_tools(tools.clone())
                .with_extended_thinking(thinking && iteration == 0)
                .with_max_tokens(self.max_tokens);

            let response = self.call_model(request).await?;
            model_calls += 1;
            if let Some(u) = &response.usage {
                usage.add(u);
            }

            let calls: Vec<ToolUse> = response.tool_uses().into_iter().cloned().collect();
            debug!(
                iteration,
                tool_calls = calls.len(),
                stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
                "Model responded"
            );

            let keep_text = match self.text_retention {
                TextRetention::FinalTurns => iteration == 0 || calls.is_empty(),
                TextRetention::AllTurns => true,
            };
            if keep_text {
                fragments.push(response.text());
            }

            let assistant = Message::assistant(response.content);
            if calls.is_empty() {
                if let Some(query) = pending.take() {
                    conversation.push(query);
                }
                conversation.push(assistant);
                finished = true;
                break;
            }

            let results = self.execute_tools(active, &calls).await;
            tool_calls += results.len();
            if let Some(query) = pending.take() {
                conversation.push(query);
            }
            conversation.push(assistant);
            conversation.push(Message::tool_results(results));
        }

        if !finished {
            warn!(max_turns, "Turn budget exhausted, requesting summary");
            let summary = self.summarize(conversation, pending.take(), system_prompt).await?;
            model_calls += 1;
            if let Some(u) = &summary.usage {
                usage.add(u);
            }

            let text = summary.text();
            match self.text_retention {
                TextRetention::FinalTurns => fragments = vec![text],
                TextRetention::AllTurns => fragments.push(text),
            }
        }

        let answer = fragments
            .into_iter()
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            session_id = %conversation.id,
            model_calls,
            tool_calls,
            budget_exhausted = !finished,
            "Query complete"
        );

        Ok(QueryOutcome {
            answer,
            model_calls,
            tool_calls,
            budget_exhausted: !finished,
            usage,
        })
    }

    /// Release the tool session. Safe to call any number of times; only the
    /// first call after a successful initialization closes anything.
    pub async fn cleanup(&mut self) {
        match self.session.take() {
            Some(active) => {
                active.session.close().await;
                info!(target = %self.connector.describe(), "Tool session released");
            }
            None => debug!("No tool session to release"),
        }
    }

    async fn call_model(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let call = self.provider.complete(request);
        let response = match self.model_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                ProviderError::Timeout(format!(
                    "{} did not respond within {}s",
                    self.provider.name(),
                    limit.as_secs()
                ))
            })??,
            None => call.await?,
        };
        Ok(response)
    }

    /// The final tool-free call after the budget is spent. The instruction
    /// and the text of the reply are appended to the conversation, after the
    /// query if no earlier call committed it.
    async fn summarize(
        &self,
        conversation: &mut Conversation,
        pending: Option<Message>,
        system_prompt: &str,
    ) -> Result<CompletionResponse, Error> {
        let instruction = Message::user(SUMMARY_INSTRUCTION);
        let mut messages = outgoing(conversation, pending.as_ref());
        messages.push(instruction.clone());

        let request = CompletionRequest::new(system_prompt, messages).with_max_tokens(self.max_tokens);
        let mut response = self.call_model(request).await?;

        let ignored = response.tool_uses().len();
        if ignored > 0 {
            warn!(ignored, "Summary response contained tool calls, ignoring them");
            response.content.retain(|block| matches!(block, ContentBlock::Text { .. }));
        }

        if let Some(query) = pending {
            conversation.push(query);
        }
        conversation.push(instruction);
        conversation.push(Message::assistant(response.content.clone()));
        Ok(response)
    }

    /// Execute every call of one assistant message. Results come back in
    /// call order whether or not the calls ran concurrently.
    async fn execute_tools(&self, active: &ActiveSession, calls: &[ToolUse]) -> Vec<ToolResult> {
        if self.parallel_tool_calls && calls.len() > 1 {
            futures::future::join_all(calls.iter().map(|call| self.execute_tool(active, call))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute_tool(active, call).await);
            }
            results
        }
    }

    async fn execute_tool(&self, active: &ActiveSession, call: &ToolUse) -> ToolResult {
        info!(tool = %call.name, call_id = %call.id, "Executing tool");
        let started = Instant::now();

        let outcome = if active.catalog.get(&call.name).is_none() {
            Err(ToolError::NotFound(call.name.clone()))
        } else {
            let execution = active.session.call_tool(&call.name, call.input.clone());
            match self.tool_timeout {
                Some(limit) => tokio::time::timeout(limit, execution).await.unwrap_or_else(|_| {
                    Err(ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout_secs: limit.as_secs(),
                    })
                }),
                None => execution.await,
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(output) if output.is_error => {
                warn!(tool = %call.name, elapsed_ms, "Tool reported an error")
            }
            Ok(_) => debug!(tool = %call.name, elapsed_ms, "Tool succeeded"),
            Err(e) => warn!(tool = %call.name, elapsed_ms, error = %e, "Tool call failed"),
        }

        normalize::to_tool_result(&call.id, outcome)
    }
}

/// The committed history followed by the not yet committed query, if any.
fn outgoing(conversation: &Conversation, pending: Option<&Message>) -> Vec<Message> {
    conversation.messages().iter().chain(pending).cloned().collect()
}
