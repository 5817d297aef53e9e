//! The query service used by the HTTP gateway and one-shot CLI commands.
//!
//! Every query gets its own orchestrator and therefore its own tool
//! session, released on every exit path. Continuation queries work on a
//! copy of the stored conversation that is written back only on success.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use unitypilot_config::{AgentConfig, AppConfig, ModelConfig};
use unitypilot_core::error::Error;
use unitypilot_core::message::{Conversation, SessionId};
use unitypilot_core::provider::Provider;
use unitypilot_core::tool::SessionConnector;
use unitypilot_providers::build_provider;
use unitypilot_tools::StdioConnector;

use crate::orchestrator::{Orchestrator, QueryOutcome};
use crate::sessions::SessionStore;

/// Answers user queries. The boundary the gateway talks to.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Answer `query`, continuing `session` when given.
    async fn run_query(&self, session: Option<&SessionId>, query: &str) -> Result<String, Error>;
}

pub struct QueryService {
    provider: Arc<dyn Provider>,
    connector: Arc<dyn SessionConnector>,
    agent: AgentConfig,
    model: ModelConfig,
    sessions: SessionStore,
}

impl QueryService {
    pub fn new(
        provider: Arc<dyn Provider>,
        connector: Arc<dyn SessionConnector>,
        agent: AgentConfig,
        model: ModelConfig,
    ) -> Self {
        let sessions = SessionStore::new(agent.max_sessions);
        Self {
            provider,
            connector,
            agent,
            model,
            sessions,
        }
    }

    /// Build the model endpoint and the Unity MCP connector from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let provider = build_provider(config)?;
        let connector = StdioConnector::from_config(&config.unity_mcp).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        Ok(Self::new(
            provider,
            Arc::new(connector),
            config.agent.clone(),
            config.model.clone(),
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// A fresh, uninitialized orchestrator with this service's settings.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::from_config(self.provider.clone(), self.connector.clone(), &self.agent, &self.model)
    }

    pub async fn run(&self, session: Option<&SessionId>, query: &str) -> Result<QueryOutcome, Error> {
        let mut lease = match session {
            Some(id) => Some(self.sessions.checkout(id).await),
            None => None,
        };
        let mut scratch = Conversation::new();
        let conversation = match lease.as_mut() {
            Some(lease) => &mut lease.conversation,
            None => &mut scratch,
        };

        let mut orchestrator = self.orchestrator();
        let result = match orchestrator.initialize().await {
            Ok(()) => {
                orchestrator
                    .continue_query(conversation, query, self.agent.system_prompt(), self.agent.max_turns)
                    .await
            }
            Err(e) => Err(e),
        };
        orchestrator.cleanup().await;

        match result {
            Ok(outcome) => {
                if let Some(lease) = lease {
                    self.sessions.commit(lease);
                }
                info!(model_calls = outcome.model_calls, tool_calls = outcome.tool_calls, "Query answered");
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "Query failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl QueryRunner for QueryService {
    async fn run_query(&self, session: Option<&SessionId>, query: &str) -> Result<String, Error> {
        self.run(session, query).await.map(|outcome| outcome.answer)
    }
}
