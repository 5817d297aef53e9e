//! MCP tool session over stdio.
//!
//! Spawns the Unity MCP server as a child process and speaks MCP to it
//! through `rmcp`. Each connection owns its child; dropping or closing the
//! session shuts the server down.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, Implementation, LoggingLevel,
    LoggingMessageNotificationParam, ProtocolVersion,
};
use rmcp::service::{NotificationContext, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::{ClientHandler, RoleClient};
use tracing::{debug, error, info, warn};
use unitypilot_config::{ConfigError, UnityMcpConfig};
use unitypilot_core::error::{SessionError, ToolError};
use unitypilot_core::tool::{SessionConnector, ToolDescriptor, ToolOutput, ToolSession};

use crate::catalog::{descriptor_from_mcp, output_from_mcp};

/// How to launch an MCP server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl McpServerCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    pub fn from_config(config: &UnityMcpConfig) -> Result<Self, ConfigError> {
        let command = Self::new(config.command.clone(), config.launch_args()?);
        Ok(config
            .env
            .iter()
            .fold(command, |command, (key, value)| command.with_env(key, value)))
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).envs(self.env.iter().cloned()).kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for McpServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct UnityClientHandler {
    info: ClientInfo,
}

impl UnityClientHandler {
    fn new() -> Self {
        Self {
            info: ClientInfo {
                protocol_version: ProtocolVersion::LATEST,
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: "unitypilot".to_string(),
                    title: None,
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    icons: None,
                    website_url: None,
                },
            },
        }
    }
}

impl ClientHandler for UnityClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    async fn on_logging_message(
        &self,
        params: LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        let LoggingMessageNotificationParam { level, logger, data } = params;
        let logger = logger.as_deref().unwrap_or("unity-mcp");
        match level {
            LoggingLevel::Emergency | LoggingLevel::Alert | LoggingLevel::Critical | LoggingLevel::Error => {
                error!(logger, %data, "MCP server log")
            }
            LoggingLevel::Warning => warn!(logger, %data, "MCP server log"),
            LoggingLevel::Notice | LoggingLevel::Info => info!(logger, %data, "MCP server log"),
            _ => debug!(logger, %data, "MCP server log"),
        }
    }
}

/// Opens stdio MCP sessions by spawning the configured server command.
pub struct StdioConnector {
    command: McpServerCommand,
    handshake_timeout: Duration,
}

impl StdioConnector {
    pub fn new(command: McpServerCommand) -> Self {
        Self {
            command,
            handshake_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn from_config(config: &UnityMcpConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(McpServerCommand::from_config(config)?)
            .with_handshake_timeout(Duration::from_secs(config.handshake_timeout_secs)))
    }
}

#[async_trait]
impl SessionConnector for StdioConnector {
    fn describe(&self) -> String {
        self.command.to_string()
    }

    async fn connect(&self) -> Result<Box<dyn ToolSession>, SessionError> {
        info!(command = %self.command, "Starting MCP server");

        let transport = TokioChildProcess::new(self.command.to_command()).map_err(|e| SessionError::Spawn {
            command: self.command.to_string(),
            reason: e.to_string(),
        })?;

        let service = tokio::time::timeout(self.handshake_timeout, rmcp::serve_client(UnityClientHandler::new(), transport))
            .await
            .map_err(|_| SessionError::Timeout(self.handshake_timeout.as_secs()))?
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        if let Some(server) = service.peer().peer_info() {
            info!(
                server = %server.server_info.name,
                version = %server.server_info.version,
                "MCP session established"
            );
        }

        Ok(Box::new(McpToolSession {
            label: self.command.to_string(),
            service,
        }))
    }
}

/// A live MCP client session.
pub struct McpToolSession {
    label: String,
    service: RunningService<RoleClient, UnityClientHandler>,
}

#[async_trait]
impl ToolSession for McpToolSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let tools = self
            .service
            .peer()
            .list_all_tools()
            .await
            .map_err(|e| SessionError::ListTools(e.to_string()))?;

        debug!(count = tools.len(), "Listed MCP tools");
        Ok(tools.into_iter().map(descriptor_from_mcp).collect())
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let arguments = match arguments {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "arguments for {name} must be an object, got: {other}"
                )));
            }
        };

        let result = self
            .service
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| call_error(name, e))?;

        Ok(output_from_mcp(result))
    }

    async fn close(self: Box<Self>) {
        let Self { label, service } = *self;
        match service.cancel().await {
            Ok(reason) => debug!(session = %label, ?reason, "MCP session closed"),
            Err(e) => warn!(session = %label, error = %e, "MCP session did not shut down cleanly"),
        }
    }
}

/// A JSON-RPC error answered by the server is a failed execution; anything
/// else means the connection itself broke.
fn call_error(name: &str, error: rmcp::ServiceError) -> ToolError {
    match error {
        rmcp::ServiceError::McpError(data) => ToolError::ExecutionFailed {
            tool_name: name.to_string(),
            reason: data.message.to_string(),
        },
        other => ToolError::Transport(other.to_string()),
    }
}
