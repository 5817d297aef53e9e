//! Configuration loading, validation, and management for UnityPilot.
//!
//! Loads configuration from `~/.unitypilot/config.toml`, then applies `.env`
//! entries and environment variable overrides. Validates all settings at
//! startup.

pub mod dotenv;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default system prompt for Unity MCP interactions.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a Senior Unity Developer and Technical Lead with deep expertise in Unity Engine,
C# programming, and game development best practices. You have access to Unity MCP tools
that allow you to directly interact with the Unity Editor to create, modify, and manage projects.

APPROACH:
1. **Analyze & Plan**: Before taking action, carefully analyze the request and formulate
   a clear, step-by-step plan
2. **Explain Your Reasoning**: Share your thought process and explain why you're choosing
   specific approaches
3. **Execute Methodically**: Use tools systematically, explaining each step as you go
4. **Adapt & Problem-Solve**: If issues arise, diagnose problems, explain what went wrong,
   and adjust your approach

TECHNICAL EXPERTISE:
- Unity Editor workflows and project structure
- C# scripting with Unity-specific patterns (MonoBehaviour, ScriptableObjects, etc.)
- Scene management, GameObject hierarchies, and component systems
- Asset management and optimization
- Performance considerations and debugging
- Modern Unity features and recommended practices

COMMUNICATION STYLE:
- Be clear and educational in explanations
- Break down complex tasks into understandable steps
- Provide context for your decisions and trade-offs
- Offer alternative solutions when appropriate
- Share relevant Unity tips and best practices

When working with tools, always verify results and handle errors gracefully. Your goal is
not just to complete tasks, but to help users understand Unity development concepts and
improve their skills.";

/// Deployment environment. Selects bind defaults and secret-key policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Development,
        Environment::Testing,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            Self::Development | Self::Testing => "127.0.0.1",
            Self::Staging | Self::Production => "0.0.0.0",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Development => 5000,
            Self::Testing => 5001,
            Self::Staging => 8000,
            Self::Production => 8080,
        }
    }

    /// Whether session cookies should carry the `Secure` attribute (HTTPS).
    pub fn secure_cookies(&self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "Invalid configuration: {s}. Valid options: development, testing, staging, production"
                ))
            })
    }
}

/// Which model endpoint family answers queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVendor {
    /// Anthropic Messages API
    #[default]
    #[serde(alias = "default")]
    Anthropic,

    /// Any OpenAI-compatible chat completions endpoint
    #[serde(rename = "openai")]
    OpenAi,

    /// 0G compute network: OpenAI-compatible endpoint with per-request headers
    #[serde(alias = "0g")]
    ZeroG,
}

impl ModelVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::ZeroG => "zerog",
        }
    }
}

impl fmt::Display for ModelVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVendor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "zerog" | "0g" => Ok(Self::ZeroG),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown model vendor: {other}. Valid options: anthropic, openai, zerog"
            ))),
        }
    }
}

/// Which turns contribute text to the final answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRetention {
    /// The first turn and any turn without tool calls
    #[default]
    FinalTurns,
    /// Every turn
    AllTurns,
}

/// The root configuration structure.
///
/// Maps directly to `~/.unitypilot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// Unity MCP server launch settings
    #[serde(default)]
    pub unity_mcp: UnityMcpConfig,

    /// Model endpoint settings
    #[serde(default)]
    pub model: ModelConfig,

    /// 0G compute network settings (used when `model.vendor = "zerog"`)
    #[serde(default)]
    pub zerog: ZeroGConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnityMcpConfig {
    /// Directory holding the Unity MCP server's `server.py`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_dir: Option<PathBuf>,

    /// Launcher executable
    #[serde(default = "default_mcp_command")]
    pub command: String,

    /// Explicit launcher arguments. When unset the server is started with
    /// `--directory <server_dir> run server.py`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Time allowed for spawn plus the MCP handshake
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Extra environment for the server process, e.g. `UNITY_PORT`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_mcp_command() -> String {
    "uv".into()
}
fn default_handshake_timeout() -> u64 {
    30
}

impl Default for UnityMcpConfig {
    fn default() -> Self {
        Self {
            server_dir: None,
            command: default_mcp_command(),
            args: None,
            handshake_timeout_secs: default_handshake_timeout(),
            env: BTreeMap::new(),
        }
    }
}

impl UnityMcpConfig {
    /// The launcher arguments for the Unity MCP server.
    pub fn launch_args(&self) -> Result<Vec<String>, ConfigError> {
        if let Some(args) = &self.args {
            return Ok(args.clone());
        }
        let dir = self
            .server_dir
            .as_ref()
            .ok_or(ConfigError::MissingSetting("UNITY_MCP_SERVER_DIR"))?;
        Ok(vec![
            "--directory".into(),
            dir.display().to_string(),
            "run".into(),
            "server.py".into(),
        ])
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub vendor: ModelVendor,

    /// Model name; `None` picks the vendor default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override for the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Request extended reasoning on the first model call of a run
    #[serde(default)]
    pub extended_thinking: bool,

    #[serde(default = "default_thinking_budget")]
    pub thinking_budget_tokens: u32,

    /// HTTP timeout for one model call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    1024
}
fn default_thinking_budget() -> u32 {
    1024
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vendor: ModelVendor::default(),
            model: None,
            api_key: None,
            api_url: None,
            max_tokens: default_max_tokens(),
            temperature: None,
            extended_thinking: false,
            thinking_budget_tokens: default_thinking_budget(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("vendor", &self.vendor)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("extended_thinking", &self.extended_thinking)
            .field("thinking_budget_tokens", &self.thinking_budget_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZeroGConfig {
    /// Base URL of the headers-issuing service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    /// OpenAI-compatible endpoint serving the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Overrides [`DEFAULT_SYSTEM_PROMPT`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// Run the tool calls of one assistant message concurrently
    #[serde(default)]
    pub parallel_tool_calls: bool,

    #[serde(default)]
    pub text_retention: TextRetention,

    /// Continuation sessions kept in memory before the oldest is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_turns() -> usize {
    10
}
fn default_max_sessions() -> usize {
    256
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_turns: default_max_turns(),
            model_timeout_secs: None,
            tool_timeout_secs: None,
            parallel_tool_calls: false,
            text_retention: TextRetention::default(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl AgentConfig {
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind address; `None` uses the environment default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// `None` uses the environment default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_cookies: Option<bool>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Key for signing session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            secure_cookies: None,
            max_body_bytes: default_max_body_bytes(),
            secret_key: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure_cookies", &self.secure_cookies)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("secret_key", &redact(&self.secret_key))
            .finish()
    }
}

/// Secret key lookup and generation.
pub struct SecretKeyManager;

impl SecretKeyManager {
    /// Generate a new random key: 32 bytes, hex encoded.
    pub fn generate_secret_key() -> String {
        hex::encode(rand::random::<[u8; 32]>())
    }

    /// Return the configured key, or a temporary one outside production.
    pub fn resolve(configured: Option<&str>, environment: Environment) -> Result<String, ConfigError> {
        match configured {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ if environment == Environment::Production => Err(ConfigError::MissingSecretKey),
            _ => {
                if environment != Environment::Testing {
                    tracing::warn!(
                        %environment,
                        "Generated temporary SECRET_KEY; set SECRET_KEY for production"
                    );
                }
                Ok(Self::generate_secret_key())
            }
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.unitypilot/config.toml).
    ///
    /// `.env` entries (current directory, then the config directory) and
    /// environment variables override file values:
    /// - `CONFIG_MODE`, `HOST`, `PORT`, `SECRET_KEY`
    /// - `UNITY_MCP_SERVER_DIR`
    /// - `MODEL_VENDOR`, `UNITYPILOT_MODEL`, `ANTHROPIC_API_KEY` / `OPENAI_API_KEY`
    /// - `ZG_SERVICE_API_URL`, `ZG_MODEL_NAME`, `ZG_MODEL_ENDPOINT`, `ZG_PROVIDER_ADDRESS`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`AppConfig::load`] but with an explicit config file path.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Self::config_dir().join("config.toml");
        let mut config = Self::read_file(path.unwrap_or(&default_path))?;

        let dotenv = dotenv::load_first(&[PathBuf::from(".env"), Self::config_dir().join(".env")]);
        config.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()))?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mode) = lookup("CONFIG_MODE") {
            self.environment = mode.parse()?;
        }
        if let Some(dir) = lookup("UNITY_MCP_SERVER_DIR") {
            self.unity_mcp.server_dir = Some(PathBuf::from(dir));
        }
        if let Some(vendor) = lookup("MODEL_VENDOR") {
            self.model.vendor = vendor.parse()?;
        }
        if let Some(model) = lookup("UNITYPILOT_MODEL") {
            self.model.model = Some(model);
        }
        if self.model.api_key.is_none() {
            self.model.api_key = match self.model.vendor {
                ModelVendor::Anthropic => lookup("ANTHROPIC_API_KEY"),
                ModelVendor::OpenAi => lookup("OPENAI_API_KEY"),
                ModelVendor::ZeroG => None,
            };
        }

        let zerog = [
            ("ZG_SERVICE_API_URL", &mut self.zerog.service_api_url),
            ("ZG_MODEL_NAME", &mut self.zerog.model_name),
            ("ZG_MODEL_ENDPOINT", &mut self.zerog.model_endpoint),
            ("ZG_PROVIDER_ADDRESS", &mut self.zerog.provider_address),
        ];
        for (key, slot) in zerog {
            if let Some(value) = lookup(key) {
                *slot = Some(value);
            }
        }

        if let Some(host) = lookup("HOST") {
            self.gateway.host = Some(host);
        }
        if let Some(port) = lookup("PORT") {
            let port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("PORT must be a port number, got {port}")))?;
            self.gateway.port = Some(port);
        }
        if let Some(key) = lookup("SECRET_KEY") {
            self.gateway.secret_key = Some(key);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".unitypilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.model.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError("agent.max_turns must be at least 1".into()));
        }

        if self.agent.max_sessions == 0 {
            return Err(ConfigError::ValidationError("agent.max_sessions must be at least 1".into()));
        }

        if self.model.extended_thinking && self.model.thinking_budget_tokens < 1024 {
            return Err(ConfigError::ValidationError(
                "model.thinking_budget_tokens must be at least 1024".into(),
            ));
        }

        Ok(())
    }

    pub fn host(&self) -> String {
        self.gateway
            .host
            .clone()
            .unwrap_or_else(|| self.environment.default_host().to_string())
    }

    pub fn port(&self) -> u16 {
        self.gateway.port.unwrap_or_else(|| self.environment.default_port())
    }

    pub fn secure_cookies(&self) -> bool {
        self.gateway
            .secure_cookies
            .unwrap_or_else(|| self.environment.secure_cookies())
    }

    /// The cookie-signing key. Production requires a configured key.
    pub fn secret_key(&self) -> Result<String, ConfigError> {
        SecretKeyManager::resolve(self.gateway.secret_key.as_deref(), self.environment)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Effective settings as `key = value` pairs with secrets redacted.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            ("environment", self.environment.to_string()),
            ("host", self.host()),
            ("port", self.port().to_string()),
            (
                "unity_mcp.server_dir",
                self.unity_mcp
                    .server_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(unset)".into()),
            ),
            ("unity_mcp.command", self.unity_mcp.command.clone()),
            ("model.vendor", self.model.vendor.to_string()),
            ("model.model", self.model.model.clone().unwrap_or_else(|| "(vendor default)".into())),
            ("model.api_key", redact(&self.model.api_key).to_string()),
            ("agent.max_turns", self.agent.max_turns.to_string()),
            ("gateway.secret_key", redact(&self.gateway.secret_key).to_string()),
        ];
        if self.model.vendor == ModelVendor::ZeroG {
            let unset = || "(unset)".to_string();
            out.push(("zerog.service_api_url", self.zerog.service_api_url.clone().unwrap_or_else(unset)));
            out.push(("zerog.model_endpoint", self.zerog.model_endpoint.clone().unwrap_or_else(unset)));
            out.push(("zerog.model_name", self.zerog.model_name.clone().unwrap_or_else(unset)));
        }
        out
    }

    /// Build a lookup over a fixed map (for tests and embedding).
    pub fn lookup_from(vars: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).cloned()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("{0} environment variable is required")]
    MissingSetting(&'static str),

    #[error("SECRET_KEY environment variable must be set in production. Generate one with: unitypilot secret")]
    MissingSecretKey,
}
