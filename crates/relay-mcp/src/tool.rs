use relay_llm::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema combinators the function-calling API rejects at the top level.
const REJECTED_COMBINATORS: [&str; 2] = ["oneOf", "allOf"];

/// A tool discovered on one MCP server, with its schema already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub server_id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Map<String, Value>,
}

impl ToolSpec {
    /// Build a spec from raw server output, normalizing the schema.
    #[must_use]
    pub fn new(
        server_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Map<String, Value>,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            name: name.into(),
            description: description.into(),
            input_schema: normalize_schema(input_schema),
        }
    }

    /// Render the LLM-facing function definition.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::Function {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: Value::Object(self.input_schema.clone()),
        }
    }
}

/// Make a server-provided input schema acceptable as function parameters.
///
/// Drops top-level `oneOf`/`allOf` and guarantees a `properties` key.
/// Every other key, nested content included, passes through untouched.
#[must_use]
pub fn normalize_schema(mut schema: Map<String, Value>) -> Map<String, Value> {
    for key in REJECTED_COMBINATORS {
        schema.shift_remove(key);
    }
    schema
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    schema
}
