use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RELAY_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("RELAY_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("RELAY_LLM_INSTRUCTIONS") {
            self.llm.instructions = Some(v);
        }
        if let Ok(v) = std::env::var("RELAY_MCP_SERVERS") {
            self.mcp.servers_path = v.into();
        }
        if let Ok(v) = std::env::var("RELAY_MCP_HANDSHAKE_TIMEOUT") {
            if let Ok(secs) = v.parse::<u64>() {
                self.mcp.handshake_timeout = secs;
            } else {
                tracing::warn!("ignoring invalid RELAY_MCP_HANDSHAKE_TIMEOUT value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RELAY_MCP_CALL_TIMEOUT") {
            if let Ok(secs) = v.parse::<u64>() {
                self.mcp.call_timeout = secs;
            } else {
                tracing::warn!("ignoring invalid RELAY_MCP_CALL_TIMEOUT value: {v}");
            }
        }
        if let Ok(v) = std::env::var("RELAY_AGENT_MAX_TOOL_ROUNDS") {
            if let Ok(n) = v.parse::<usize>() {
                self.agent.max_tool_rounds = n;
            } else {
                tracing::warn!("ignoring invalid RELAY_AGENT_MAX_TOOL_ROUNDS value: {v}");
            }
        }
    }
}
