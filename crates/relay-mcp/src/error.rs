use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("transport failed for server '{server_id}': {message}")]
    Transport { server_id: String, message: String },

    #[error("server '{server_id}' uses transport '{kind}' which cannot be opened locally")]
    UnsupportedTransport { server_id: String, kind: &'static str },

    #[error("invalid descriptor for server '{server_id}': {message}")]
    InvalidDescriptor { server_id: String, message: String },

    #[error("protocol error on server '{server_id}': {message}")]
    Protocol { server_id: String, message: String },

    #[error("tool call failed: {server_id}/{tool_name}: {message}")]
    ToolCall {
        server_id: String,
        tool_name: String,
        message: String,
    },

    #[error("tool call timed out after {timeout_secs}s: {server_id}/{tool_name}")]
    Timeout {
        server_id: String,
        tool_name: String,
        timeout_secs: u64,
    },

    #[error("session for server '{server_id}' is closed")]
    SessionClosed { server_id: String },

    #[error("failed to close server '{server_id}': {message}")]
    Close { server_id: String, message: String },
}

impl McpError {
    #[must_use]
    pub fn server_id(&self) -> &str {
        match self {
            Self::Transport { server_id, .. }
            | Self::UnsupportedTransport { server_id, .. }
            | Self::InvalidDescriptor { server_id, .. }
            | Self::Protocol { server_id, .. }
            | Self::ToolCall { server_id, .. }
            | Self::Timeout { server_id, .. }
            | Self::SessionClosed { server_id }
            | Self::Close { server_id, .. } => server_id,
        }
    }
}

/// Failures that make the whole descriptor file unusable.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("server descriptor file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read server descriptor file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse server descriptor file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("server descriptor file {} has no 'mcpServers' object", path.display())]
    MissingServers { path: PathBuf },

    #[error("server descriptor file {} declares no servers", path.display())]
    Empty { path: PathBuf },
}
