use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::vault::Secret;

pub(crate) fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

pub(crate) fn default_model() -> String {
    "gpt-4.1".into()
}

fn default_servers_path() -> PathBuf {
    PathBuf::from("mcp_servers.json")
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_call_timeout() -> u64 {
    60
}

fn default_max_tool_rounds() -> usize {
    10
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// System-level instructions sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            instructions: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct McpConfig {
    /// JSON file listing the servers under `mcpServers`.
    #[serde(default = "default_servers_path")]
    pub servers_path: PathBuf,
    /// Seconds allowed for `initialize` and the first `tools/list`.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,
    /// Seconds allowed for a single `tools/call`.
    #[serde(default = "default_call_timeout")]
    pub call_timeout: u64,
}

impl McpConfig {
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout)
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers_path: default_servers_path(),
            handshake_timeout: default_handshake_timeout(),
            call_timeout: default_call_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Tool rounds allowed per turn; `0` means no cap.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl AgentConfig {
    #[must_use]
    pub fn round_limit(&self) -> Option<usize> {
        (self.max_tool_rounds > 0).then_some(self.max_tool_rounds)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
}
