use std::borrow::Cow;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use rmcp::model::{CallToolRequestParams, CallToolResult, ProtocolVersion};
use rmcp::service::RunningService;
use rmcp::transport::IntoTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};

use crate::error::McpError;
use crate::tool::ToolSpec;
use crate::transport::ChannelPair;

type ClientService = RunningService<RoleClient, ()>;

/// Protocol revisions this client speaks.
pub const SUPPORTED_PROTOCOL_VERSIONS: [ProtocolVersion; 3] = [
    ProtocolVersion::V_2024_11_05,
    ProtocolVersion::V_2025_03_26,
    ProtocolVersion::V_2025_06_18,
];

/// Text returned by one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    /// The server reported the call as failed; `text` carries its message.
    pub is_error: bool,
}

impl ToolOutput {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    fn from_result(server_id: &str, tool_name: &str, result: CallToolResult) -> Self {
        let mut parts = Vec::with_capacity(result.content.len());
        for block in &result.content {
            if let Some(text) = block.raw.as_text() {
                parts.push(text.text.as_str());
            } else {
                tracing::debug!(server_id, tool_name, "skipping non-text content block");
            }
        }
        Self {
            text: parts.join("\n"),
            is_error: result.is_error.unwrap_or(false),
        }
    }
}

/// A connected server that can run tools.
pub trait ToolSession: Send + Sync {
    fn id(&self) -> &str;

    fn tools(&self) -> &[ToolSpec];

    fn has_tool(&self, name: &str) -> bool;

    /// Invoke `name` on this server.
    ///
    /// # Errors
    ///
    /// Returns `McpError` if the session is closed, the call times out, or the
    /// RPC fails. A tool that runs and reports failure is not an error: it
    /// yields a `ToolOutput` with `is_error` set.
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = Result<ToolOutput, McpError>> + Send;

    /// Shut the session down. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `McpError::Close` if the underlying service fails to stop.
    fn close(&mut self) -> impl Future<Output = Result<(), McpError>> + Send;
}

/// An initialized rmcp client session with its tool list.
pub struct McpSession {
    server_id: String,
    service: Option<ClientService>,
    tools: Vec<ToolSpec>,
    tool_names: HashSet<String>,
    call_timeout: Duration,
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("server_id", &self.server_id)
            .field("tools", &self.tools.len())
            .field("open", &self.service.is_some())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl McpSession {
    /// Run `initialize`, check the negotiated protocol version, and fetch the
    /// tool list.
    ///
    /// Either a fully usable session is returned or the service is shut down.
    ///
    /// # Errors
    ///
    /// Returns `McpError::Protocol` on handshake timeout or failure, an
    /// unsupported protocol version, or a failed tool listing.
    pub async fn handshake(
        server_id: &str,
        pair: ChannelPair,
        handshake_timeout: Duration,
        call_timeout: Duration,
    ) -> Result<Self, McpError> {
        tracing::debug!(server_id, transport = pair.kind(), "starting MCP handshake");
        match pair {
            ChannelPair::Stdio(child) => {
                Self::handshake_over(server_id, child, handshake_timeout, call_timeout).await
            }
            ChannelPair::Sse(channel) => {
                Self::handshake_over(
                    server_id,
                    channel.into_parts(),
                    handshake_timeout,
                    call_timeout,
                )
                .await
            }
            ChannelPair::Http(url) => {
                let transport = StreamableHttpClientTransport::from_uri(url.as_str().to_owned());
                Self::handshake_over(server_id, transport, handshake_timeout, call_timeout).await
            }
        }
    }

    async fn handshake_over<T, E, A>(
        server_id: &str,
        transport: T,
        handshake_timeout: Duration,
        call_timeout: Duration,
    ) -> Result<Self, McpError>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let service = initialize(server_id, transport, handshake_timeout).await?;

        let protocol_error = |message: String| McpError::Protocol {
            server_id: server_id.to_owned(),
            message,
        };

        let version = service.peer_info().map(|info| info.protocol_version.clone());
        match version {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => {
                tracing::debug!(
                    server_id,
                    protocol = %render_version(&v),
                    "MCP handshake complete"
                );
            }
            other => {
                let _ = service.cancel().await;
                return Err(protocol_error(format!(
                    "unsupported protocol version {}",
                    other.map_or_else(|| "<none>".to_owned(), |v| render_version(&v))
                )));
            }
        }

        let listed = match tokio::time::timeout(handshake_timeout, service.list_all_tools()).await
        {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                let _ = service.cancel().await;
                return Err(protocol_error(format!("tools/list failed: {e}")));
            }
            Err(_) => {
                let _ = service.cancel().await;
                return Err(protocol_error(format!(
                    "tools/list timed out after {}s",
                    handshake_timeout.as_secs()
                )));
            }
        };

        let tools: Vec<ToolSpec> = listed
            .into_iter()
            .map(|t| {
                ToolSpec::new(
                    server_id,
                    t.name.as_ref(),
                    t.description.as_deref().unwrap_or_default(),
                    (*t.input_schema).clone(),
                )
            })
            .collect();

        Ok(Self::from_parts(server_id, Some(service), tools, call_timeout))
    }

    fn from_parts(
        server_id: &str,
        service: Option<ClientService>,
        tools: Vec<ToolSpec>,
        call_timeout: Duration,
    ) -> Self {
        let tool_names = tools.iter().map(|t| t.name.clone()).collect();
        Self {
            server_id: server_id.to_owned(),
            service,
            tools,
            tool_names,
            call_timeout,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.service.is_some()
    }
}

fn render_version(version: &ProtocolVersion) -> String {
    serde_json::to_value(version)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

async fn initialize<T, E, A>(
    server_id: &str,
    transport: T,
    timeout: Duration,
) -> Result<ClientService, McpError>
where
    T: IntoTransport<RoleClient, E, A>,
    E: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(timeout, ().serve(transport)).await {
        Ok(Ok(service)) => Ok(service),
        Ok(Err(e)) => Err(McpError::Protocol {
            server_id: server_id.to_owned(),
            message: format!("initialize failed: {e}"),
        }),
        Err(_) => Err(McpError::Protocol {
            server_id: server_id.to_owned(),
            message: format!("initialize timed out after {}s", timeout.as_secs()),
        }),
    }
}

impl ToolSession for McpSession {
    fn id(&self) -> &str {
        &self.server_id
    }

    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tool_names.contains(name)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpError> {
        let service = self.service.as_ref().ok_or_else(|| McpError::SessionClosed {
            server_id: self.server_id.clone(),
        })?;

        let params = CallToolRequestParams {
            name: Cow::Owned(name.to_owned()),
            arguments: Some(arguments),
            task: None,
            meta: None,
        };

        let result = tokio::time::timeout(self.call_timeout, service.call_tool(params))
            .await
            .map_err(|_| McpError::Timeout {
                server_id: self.server_id.clone(),
                tool_name: name.into(),
                timeout_secs: self.call_timeout.as_secs(),
            })?
            .map_err(|e| McpError::ToolCall {
                server_id: self.server_id.clone(),
                tool_name: name.into(),
                message: e.to_string(),
            })?;

        Ok(ToolOutput::from_result(&self.server_id, name, result))
    }

    async fn close(&mut self) -> Result<(), McpError> {
        let Some(service) = self.service.take() else {
            return Ok(());
        };
        tracing::debug!(server_id = %self.server_id, "closing MCP session");
        service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|e| McpError::Close {
                server_id: self.server_id.clone(),
                message: e.to_string(),
            })
    }
}
