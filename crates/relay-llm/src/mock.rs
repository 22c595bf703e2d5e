//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{InputItem, LlmProvider, ModelResponse, OutputContent, OutputItem, ToolDefinition};

/// One request as the provider saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub input: Vec<InputItem>,
    pub tool_names: Vec<String>,
    pub previous_response_id: Option<String>,
}

/// Replays scripted responses in order and records every request.
///
/// When the script runs out, answers with a plain text message so loops terminate.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<ModelResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pub fail: bool,
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Build a response holding a single assistant text message.
#[must_use]
pub fn text_response(id: &str, text: &str) -> ModelResponse {
    ModelResponse {
        id: id.into(),
        output: vec![OutputItem::Message {
            content: vec![OutputContent::OutputText { text: text.into() }],
        }],
    }
}

/// Build a `function_call` output item.
#[must_use]
pub fn function_call(name: &str, arguments: &str, call_id: &str) -> OutputItem {
    OutputItem::FunctionCall {
        name: name.into(),
        arguments: arguments.into(),
        call_id: call_id.into(),
    }
}

impl LlmProvider for MockProvider {
    async fn respond(
        &self,
        input: &[InputItem],
        tools: &[ToolDefinition],
        previous_response_id: Option<&str>,
    ) -> Result<ModelResponse, LlmError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            input: input.to_vec(),
            tool_names: tools
                .iter()
                .filter_map(|t| t.function_name().map(str::to_owned))
                .collect(),
            previous_response_id: previous_response_id.map(str::to_owned),
        });
        if self.fail {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(text_response("resp_mock", "mock response"))
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
