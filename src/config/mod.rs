//! Configuration management for mcp-chat
//!
//! Values come from an optional TOML file and are then overridden by the
//! environment. The model provider credential is read only from the
//! environment and is required at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub mcp: McpConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Single origin allowed to call the API cross-origin ("*" for any)
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: usize,
    pub api_url: String,
    /// Only ever taken from ANTHROPIC_API_KEY
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1000,
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Executable that runs the tool server
    pub command: String,
    pub args: Vec<String>,
    /// Script passed to `command` after `args`
    pub server_path: Option<PathBuf>,
    /// Extra environment for the server; values may reference ${VAR}
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Tools whose successful results are answered from a template
    pub canned_reply_tools: Vec<String>,
    pub tool_timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: Vec::new(),
            server_path: Some(PathBuf::from("../mcp-ping-pong-server/dist/server.js")),
            env: HashMap::new(),
            working_dir: None,
            canned_reply_tools: vec!["ping_pong".to_string()],
            tool_timeout_secs: 30,
        }
    }
}

impl McpConfig {
    /// Full argument list for the server command
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(path) = &self.server_path {
            args.push(path.to_string_lossy().into_owned());
        }
        args
    }
}

/// How the assistant answers when no trigger rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectReplyPolicy {
    /// Give the model the tool catalog via native tool calling
    #[default]
    Catalog,
    /// Plain completion without tools
    Plain,
}

impl std::str::FromStr for DirectReplyPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "catalog" => Ok(Self::Catalog),
            "plain" => Ok(Self::Plain),
            other => anyhow::bail!("Unknown direct reply policy: {}", other),
        }
    }
}

/// A fixed utterance that maps to a fixed tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub phrase: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub direct_reply: DirectReplyPolicy,
    pub triggers: Vec<TriggerConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            direct_reply: DirectReplyPolicy::default(),
            triggers: vec![TriggerConfig {
                phrase: "ping".to_string(),
                tool: "ping_pong".to_string(),
                arguments: serde_json::json!({ "message": "ping" }),
            }],
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                match default_path {
                    Some(path) if path.exists() => Self::from_file(&path)?,
                    _ => Config::default(),
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Get the default configuration file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "mcp-chat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment-style overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: {}", port))?;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(command) = lookup("MCP_SERVER_COMMAND") {
            self.mcp.command = command;
        }
        if let Some(path) = lookup("MCP_SERVER_PATH") {
            self.mcp.server_path = Some(PathBuf::from(path));
        }
        if let Some(model) = lookup("ANTHROPIC_MODEL") {
            self.llm.model = model;
        }
        if let Some(policy) = lookup("DIRECT_REPLY_POLICY") {
            self.agent.direct_reply = policy.parse()?;
        }
        self.llm.api_key = lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty());
        Ok(())
    }

    /// Startup checks; a missing provider credential is fatal
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.is_none() {
            anyhow::bail!("ANTHROPIC_API_KEY is not set");
        }
        if self.llm.max_tokens == 0 {
            anyhow::bail!("llm.max_tokens must be greater than zero");
        }
        if self.mcp.command.trim().is_empty() {
            anyhow::bail!("mcp.command must not be empty");
        }
        for trigger in &self.agent.triggers {
            if trigger.phrase.trim().is_empty() {
                anyhow::bail!("Trigger for tool {} has an empty phrase", trigger.tool);
            }
        }
        Ok(())
    }
}
