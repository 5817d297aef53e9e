pub mod chat;
pub mod config_cmd;
pub mod query;
pub mod secret;
pub mod serve;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use unitypilot_agent::Orchestrator;
use unitypilot_config::{AppConfig, Environment};
use unitypilot_tools::StdioConnector;

/// Load configuration, letting `--mode` override `CONFIG_MODE`.
pub fn load_config(path: Option<&Path>, mode: Option<Environment>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(mode) = mode {
        config.environment = mode;
    }
    Ok(config)
}

/// An uninitialized orchestrator for the configured model and Unity MCP server.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let provider = unitypilot_providers::build_provider(config)?;
    let connector = StdioConnector::from_config(&config.unity_mcp)?;
    Ok(Orchestrator::from_config(
        provider,
        Arc::new(connector),
        &config.agent,
        &config.model,
    ))
}
