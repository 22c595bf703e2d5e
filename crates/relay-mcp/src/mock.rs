//! In-memory connector and session for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::descriptor::ServerDescriptor;
use crate::error::McpError;
use crate::manager::Connector;
use crate::session::{ToolOutput, ToolSession};
use crate::tool::ToolSpec;

#[derive(Debug, Clone)]
enum Scripted {
    Output(ToolOutput),
    Failure(String),
}

/// A call received by a [`MockSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub server_id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct MockSession {
    id: String,
    tools: Vec<ToolSpec>,
    scripts: HashMap<String, Scripted>,
    delays: HashMap<String, Duration>,
    fail_close: bool,
    closed: bool,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    close_log: Arc<Mutex<Vec<String>>>,
}

impl MockSession {
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            tools: Vec::new(),
            scripts: HashMap::new(),
            delays: HashMap::new(),
            fail_close: false,
            closed: false,
            calls: Arc::default(),
            close_log: Arc::default(),
        }
    }

    /// Add a tool with an empty schema. It answers `"{name} ok"` unless scripted.
    #[must_use]
    pub fn with_tool(self, name: &str) -> Self {
        self.with_tool_schema(name, "", Map::new())
    }

    #[must_use]
    pub fn with_tool_schema(
        mut self,
        name: &str,
        description: &str,
        schema: Map<String, Value>,
    ) -> Self {
        self.tools
            .push(ToolSpec::new(&self.id, name, description, schema));
        self
    }

    #[must_use]
    pub fn with_output(mut self, tool: &str, output: ToolOutput) -> Self {
        self.scripts.insert(tool.to_owned(), Scripted::Output(output));
        self
    }

    /// Make calls to `tool` fail with `McpError::ToolCall`.
    #[must_use]
    pub fn with_call_failure(mut self, tool: &str, message: &str) -> Self {
        self.scripts
            .insert(tool.to_owned(), Scripted::Failure(message.to_owned()));
        self
    }

    #[must_use]
    pub fn with_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.to_owned(), delay);
        self
    }

    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Calls received so far, in completion order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ToolSession for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpError> {
        if self.closed {
            return Err(McpError::SessionClosed {
                server_id: self.id.clone(),
            });
        }
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.lock().unwrap().push(RecordedCall {
            server_id: self.id.clone(),
            tool_name: name.to_owned(),
            arguments,
        });
        match self.scripts.get(name) {
            Some(Scripted::Output(output)) => Ok(output.clone()),
            Some(Scripted::Failure(message)) => Err(McpError::ToolCall {
                server_id: self.id.clone(),
                tool_name: name.to_owned(),
                message: message.clone(),
            }),
            None if self.has_tool(name) => Ok(ToolOutput::text(format!("{name} ok"))),
            None => Err(McpError::ToolCall {
                server_id: self.id.clone(),
                tool_name: name.to_owned(),
                message: "unknown tool".into(),
            }),
        }
    }

    async fn close(&mut self) -> Result<(), McpError> {
        if self.closed {
            return Ok(());
        }
        self.close_log.lock().unwrap().push(self.id.clone());
        self.closed = true;
        if self.fail_close {
            return Err(McpError::Close {
                server_id: self.id.clone(),
                message: "mock close failure".into(),
            });
        }
        Ok(())
    }
}

/// Hands out preconfigured [`MockSession`]s by descriptor id.
///
/// Ids with no configured session fail with `McpError::Transport`.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    servers: HashMap<String, MockSession>,
    attempts: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    close_log: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    #[must_use]
    pub fn with_server(mut self, mut session: MockSession) -> Self {
        session.calls = Arc::clone(&self.calls);
        session.close_log = Arc::clone(&self.close_log);
        self.servers.insert(session.id.clone(), session);
        self
    }

    /// Explicitly unreachable server; same as leaving it unconfigured.
    #[must_use]
    pub fn with_failure(mut self, id: &str) -> Self {
        self.servers.remove(id);
        self
    }

    /// Descriptor ids passed to `connect`, in order.
    #[must_use]
    pub fn connect_attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Tool calls received by any session handed out, in completion order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Session ids in the order they were closed.
    #[must_use]
    pub fn close_attempts(&self) -> Vec<String> {
        self.close_log.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, descriptor: &ServerDescriptor) -> Result<MockSession, McpError> {
        self.attempts.lock().unwrap().push(descriptor.id.clone());
        self.servers
            .get(&descriptor.id)
            .cloned()
            .ok_or_else(|| McpError::Transport {
                server_id: descriptor.id.clone(),
                message: "mock server unreachable".into(),
            })
    }
}
