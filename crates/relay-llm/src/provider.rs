use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the `input` array sent to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message { role: Role, content: String },
    FunctionCallOutput { call_id: String, output: String },
}

impl InputItem {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::Message {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn function_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// A tool advertised to the model.
///
/// `Function` tools are executed locally by relaying the call to an MCP session.
/// `Mcp` tools are hosted: the model API talks to the remote server itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    Function {
        name: String,
        description: String,
        parameters: serde_json::Value,
    },
    Mcp {
        server_label: String,
        server_url: String,
        require_approval: String,
    },
}

impl ToolDefinition {
    /// Name the model uses to call this tool; hosted entries have none.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::Function { name, .. } => Some(name),
            Self::Mcp { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputContent {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(rename = "refusal")]
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputItem {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(rename = "function_call")]
    FunctionCall {
        name: String,
        arguments: String,
        call_id: String,
    },
    /// Reasoning, hosted tool traces and anything else the relay does not act on.
    #[serde(other)]
    Other,
}

impl OutputItem {
    /// Concatenated visible text of a message item.
    #[must_use]
    pub fn message_text(&self) -> Option<String> {
        let Self::Message { content } = self else {
            return None;
        };
        let text = content
            .iter()
            .filter_map(|c| match c {
                OutputContent::OutputText { text } => Some(text.as_str()),
                OutputContent::Refusal { refusal } => Some(refusal.as_str()),
                OutputContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");
        Some(text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: String,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

impl ModelResponse {
    #[must_use]
    pub fn function_call_count(&self) -> usize {
        self.output
            .iter()
            .filter(|item| matches!(item, OutputItem::FunctionCall { .. }))
            .count()
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send one round of input to the model and return its ordered output items.
    ///
    /// `previous_response_id` chains this request onto an earlier response so the
    /// server-side conversation state is reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn respond(
        &self,
        input: &[InputItem],
        tools: &[ToolDefinition],
        previous_response_id: Option<&str>,
    ) -> impl Future<Output = Result<ModelResponse, LlmError>> + Send;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_serializes_with_type_tag() {
        let json = serde_json::to_value(InputItem::user("hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "message", "role": "user", "content": "hello"})
        );
    }

    #[test]
    fn function_output_serializes() {
        let json = serde_json::to_value(InputItem::function_output("abc", "42")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "function_call_output", "call_id": "abc", "output": "42"})
        );
    }

    #[test]
    fn function_tool_serializes_flat() {
        let tool = ToolDefinition::Function {
            name: "get_platform".into(),
            description: "Report the OS family".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["name"], "get_platform");
        assert_eq!(json["parameters"]["properties"], serde_json::json!({}));
    }

    #[test]
    fn hosted_tool_serializes_as_mcp() {
        let tool = ToolDefinition::Mcp {
            server_label: "deepwiki".into(),
            server_url: "https://mcp.deepwiki.com/mcp".into(),
            require_approval: "never".into(),
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "mcp");
        assert_eq!(json["server_label"], "deepwiki");
        assert!(tool.function_name().is_none());
    }

    #[test]
    fn parse_response_with_mixed_output() {
        let raw = r#"{
            "id": "resp_1",
            "object": "response",
            "output": [
                {"type": "reasoning", "id": "rs_1", "summary": []},
                {"type": "message", "id": "msg_1", "role": "assistant",
                 "content": [{"type": "output_text", "text": "Checking", "annotations": []}]},
                {"type": "function_call", "id": "fc_1", "name": "get_platform",
                 "arguments": "{}", "call_id": "call_1", "status": "completed"}
            ]
        }"#;
        let resp: ModelResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.id, "resp_1");
        assert_eq!(resp.output.len(), 3);
        assert_eq!(resp.output[0], OutputItem::Other);
        assert_eq!(resp.output[1].message_text().as_deref(), Some("Checking"));
        assert_eq!(resp.function_call_count(), 1);
    }

    #[test]
    fn message_text_skips_unknown_parts() {
        let item = OutputItem::Message {
            content: vec![
                OutputContent::OutputText { text: "a".into() },
                OutputContent::Other,
                OutputContent::OutputText { text: "b".into() },
            ],
        };
        assert_eq!(item.message_text().as_deref(), Some("ab"));
    }

    #[test]
    fn function_call_has_no_message_text() {
        let item = OutputItem::FunctionCall {
            name: "x".into(),
            arguments: "{}".into(),
            call_id: "c".into(),
        };
        assert!(item.message_text().is_none());
    }

    #[test]
    fn response_without_output_defaults_empty() {
        let resp: ModelResponse = serde_json::from_str(r#"{"id": "resp_2"}"#).unwrap();
        assert!(resp.output.is_empty());
        assert_eq!(resp.function_call_count(), 0);
    }
}
