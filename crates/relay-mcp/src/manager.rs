use std::future::Future;
use std::time::Duration;

use relay_llm::ToolDefinition;

use crate::catalog::ToolCatalog;
use crate::descriptor::{McpTransport, ServerDescriptor};
use crate::error::McpError;
use crate::session::{McpSession, ToolSession};
use crate::transport;

/// Turns a descriptor into a live session.
pub trait Connector: Send + Sync {
    type Session: ToolSession;

    /// Open the transport and complete the handshake.
    ///
    /// # Errors
    ///
    /// Returns `McpError` if the transport cannot be opened or the handshake fails.
    fn connect(
        &self,
        descriptor: &ServerDescriptor,
    ) -> impl Future<Output = Result<Self::Session, McpError>> + Send;
}

/// Connects over rmcp.
#[derive(Debug, Clone, Copy)]
pub struct RmcpConnector {
    pub handshake_timeout: Duration,
    pub call_timeout: Duration,
}

impl Default for RmcpConnector {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl Connector for RmcpConnector {
    type Session = McpSession;

    async fn connect(&self, descriptor: &ServerDescriptor) -> Result<McpSession, McpError> {
        let pair = tokio::time::timeout(self.handshake_timeout, transport::open(descriptor))
            .await
            .map_err(|_| McpError::Transport {
                server_id: descriptor.id.clone(),
                message: format!(
                    "opening {} transport timed out after {}s",
                    descriptor.transport.kind(),
                    self.handshake_timeout.as_secs_f32()
                ),
            })??;
        McpSession::handshake(
            &descriptor.id,
            pair,
            self.handshake_timeout,
            self.call_timeout,
        )
        .await
    }
}

/// Outcome of [`McpManager::unload`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnloadReport {
    pub closed: usize,
    pub failed: usize,
}

/// Every connected server, in declaration order, and the merged tool catalog.
pub struct McpManager<S = McpSession> {
    sessions: Vec<S>,
    catalog: ToolCatalog,
    failures: Vec<McpError>,
    hosted: usize,
}

impl<S: ToolSession> std::fmt::Debug for McpManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpManager")
            .field(
                "sessions",
                &self.sessions.iter().map(ToolSession::id).collect::<Vec<_>>(),
            )
            .field("tools", &self.catalog.len())
            .field("hosted", &self.hosted)
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl<S: ToolSession> McpManager<S> {
    /// Connect to every descriptor in order.
    ///
    /// Hosted servers become advertised-only entries. A server that fails to
    /// connect is logged, recorded in [`failures`](Self::failures), and skipped.
    pub async fn load<C>(connector: &C, descriptors: &[ServerDescriptor]) -> Self
    where
        C: Connector<Session = S>,
    {
        let mut sessions: Vec<S> = Vec::with_capacity(descriptors.len());
        let mut catalog = ToolCatalog::default();
        let mut failures = Vec::new();
        let mut hosted = 0;

        for descriptor in descriptors {
            if let McpTransport::Hosted { url, trusted } = &descriptor.transport {
                tracing::info!(server_id = %descriptor.id, url = %url, trusted, "registered hosted MCP server");
                catalog.add_hosted(hosted_definition(&descriptor.id, url, *trusted));
                hosted += 1;
                continue;
            }

            match connector.connect(descriptor).await {
                Ok(session) => {
                    let names: Vec<&str> = session.tools().iter().map(|t| t.name.as_str()).collect();
                    tracing::info!(
                        server_id = %descriptor.id,
                        transport = descriptor.transport.kind(),
                        tools = ?names,
                        "connected to MCP server"
                    );
                    catalog.add_session(sessions.len(), &session);
                    sessions.push(session);
                }
                Err(e) => {
                    tracing::warn!(server_id = %descriptor.id, "MCP server connection failed: {e}");
                    failures.push(e);
                }
            }
        }

        Self {
            sessions,
            catalog,
            failures,
            hosted,
        }
    }

    /// Session owning `tool_name`, if any.
    #[must_use]
    pub fn resolve(&self, tool_name: &str) -> Option<&S> {
        self.catalog
            .lookup(tool_name)
            .and_then(|index| self.sessions.get(index))
    }

    #[must_use]
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        self.catalog.definitions()
    }

    #[must_use]
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn sessions(&self) -> &[S] {
        &self.sessions
    }

    #[must_use]
    pub fn failures(&self) -> &[McpError] {
        &self.failures
    }

    /// Connected local sessions plus registered hosted servers.
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.sessions.len() + self.hosted
    }

    /// Close every session, newest first. Every close is attempted.
    pub async fn unload(self) -> UnloadReport {
        let mut report = UnloadReport::default();
        for mut session in self.sessions.into_iter().rev() {
            match session.close().await {
                Ok(()) => {
                    tracing::info!(server_id = session.id(), "closed MCP server");
                    report.closed += 1;
                }
                Err(e) => {
                    tracing::warn!(server_id = session.id(), "failed to close MCP server: {e}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn hosted_definition(server_id: &str, url: &str, trusted: bool) -> ToolDefinition {
    ToolDefinition::Mcp {
        server_label: server_id.to_owned(),
        server_url: url.to_owned(),
        require_approval: if trusted { "never" } else { "always" }.to_owned(),
    }
}
