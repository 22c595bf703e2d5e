use std::collections::HashMap;

use relay_llm::ToolDefinition;

use crate::session::ToolSession;

/// Tool name to owning session, plus the list advertised to the model.
///
/// Built once while loading; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    index: HashMap<String, usize>,
    definitions: Vec<ToolDefinition>,
}

impl ToolCatalog {
    /// Register every tool of the session at `session_index`.
    ///
    /// A name already owned by an earlier session keeps its owner; the
    /// duplicate is logged and not advertised.
    pub fn add_session<S: ToolSession>(&mut self, session_index: usize, session: &S) {
        for tool in session.tools() {
            if let Some(&owner) = self.index.get(&tool.name) {
                tracing::warn!(
                    tool_name = %tool.name,
                    server_id = session.id(),
                    owner_index = owner,
                    "duplicate tool name, keeping the first server's tool"
                );
                continue;
            }
            self.index.insert(tool.name.clone(), session_index);
            self.definitions.push(tool.definition());
        }
    }

    /// Advertise a hosted server; it has no local session.
    pub fn add_hosted(&mut self, definition: ToolDefinition) {
        self.definitions.push(definition);
    }

    #[must_use]
    pub fn lookup(&self, tool_name: &str) -> Option<usize> {
        self.index.get(tool_name).copied()
    }

    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Number of locally callable tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
