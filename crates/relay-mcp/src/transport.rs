//! Opening the byte channel to an MCP server.

pub mod sse;

use rmcp::transport::TokioChildProcess;
use tokio::process::Command;
use url::Url;

use crate::descriptor::{McpTransport, ServerDescriptor};
use crate::error::McpError;

pub use sse::{SseChannel, SseError};

/// An opened channel to one server, ready for the `initialize` exchange.
pub enum ChannelPair {
    /// Child process speaking JSON-RPC over stdin/stdout; killed when dropped.
    Stdio(TokioChildProcess),
    Sse(SseChannel),
    /// Streamable HTTP is connectionless until the first request, so only the
    /// validated endpoint is carried.
    Http(Url),
}

impl ChannelPair {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::Sse(_) => "sse",
            Self::Http(_) => "http",
        }
    }
}

impl std::fmt::Debug for ChannelPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio(_) => f.write_str("ChannelPair::Stdio"),
            Self::Sse(channel) => f.debug_tuple("ChannelPair::Sse").field(channel).finish(),
            Self::Http(url) => f
                .debug_tuple("ChannelPair::Http")
                .field(&url.as_str())
                .finish(),
        }
    }
}

/// Open the channel described by `descriptor`.
///
/// # Errors
///
/// Returns `McpError::Transport` if the process cannot be spawned or the
/// remote endpoint cannot be reached, and `McpError::UnsupportedTransport`
/// for hosted servers, which are never opened locally.
pub async fn open(descriptor: &ServerDescriptor) -> Result<ChannelPair, McpError> {
    let server_id = descriptor.id.as_str();
    let transport_err = |message: String| McpError::Transport {
        server_id: server_id.to_owned(),
        message,
    };

    match &descriptor.transport {
        McpTransport::Stdio { command, args, env } => {
            let mut cmd = Command::new(command);
            cmd.args(args).envs(env).kill_on_drop(true);
            let child = TokioChildProcess::new(cmd)
                .map_err(|e| transport_err(format!("failed to spawn '{command}': {e}")))?;
            tracing::debug!(server_id, command = %command, "spawned MCP server process");
            Ok(ChannelPair::Stdio(child))
        }
        McpTransport::Sse { url } => {
            let channel = SseChannel::connect(url)
                .await
                .map_err(|e| transport_err(e.to_string()))?;
            Ok(ChannelPair::Sse(channel))
        }
        McpTransport::Http { url } => {
            let url = Url::parse(url).map_err(|e| transport_err(format!("bad url: {e}")))?;
            Ok(ChannelPair::Http(url))
        }
        McpTransport::Hosted { .. } => Err(McpError::UnsupportedTransport {
            server_id: server_id.to_owned(),
            kind: descriptor.transport.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn descriptor(transport: McpTransport) -> ServerDescriptor {
        ServerDescriptor {
            id: "test".into(),
            transport,
        }
    }

    #[tokio::test]
    async fn missing_executable_is_transport_error() {
        let err = open(&descriptor(McpTransport::Stdio {
            command: "/nonexistent/relay-test-server".into(),
            args: vec![],
            env: BTreeMap::new(),
        }))
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::Transport { .. }));
        assert_eq!(err.server_id(), "test");
    }

    #[tokio::test]
    async fn hosted_is_never_opened() {
        let err = open(&descriptor(McpTransport::Hosted {
            url: "https://mcp.deepwiki.com/mcp".into(),
            trusted: false,
        }))
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            McpError::UnsupportedTransport { kind: "hosted", .. }
        ));
    }

    #[tokio::test]
    async fn http_carries_validated_url() {
        let pair = open(&descriptor(McpTransport::Http {
            url: "http://localhost:8000/mcp".into(),
        }))
        .await
        .unwrap();
        assert_eq!(pair.kind(), "http");
    }

    #[tokio::test]
    async fn unreachable_sse_is_transport_error() {
        let err = open(&descriptor(McpTransport::Sse {
            url: "http://127.0.0.1:1/sse".into(),
        }))
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::Transport { .. }));
    }
}
