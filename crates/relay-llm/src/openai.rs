use std::fmt;

use serde::Serialize;

use crate::error::LlmError;
use crate::provider::{InputItem, LlmProvider, ModelResponse, ToolDefinition};
use crate::retry::send_with_retry;

const MAX_RETRIES: u32 = 1;

/// Client for the `OpenAI` Responses API (`POST {base_url}/responses`).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    instructions: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("instructions", &self.instructions)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            instructions: None,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions.filter(|s| !s.trim().is_empty());
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [InputItem],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

impl LlmProvider for OpenAiProvider {
    async fn respond(
        &self,
        input: &[InputItem],
        tools: &[ToolDefinition],
        previous_response_id: Option<&str>,
    ) -> Result<ModelResponse, LlmError> {
        let body = ResponsesRequest {
            model: &self.model,
            input,
            tools,
            instructions: self.instructions.as_deref(),
            previous_response_id,
        };
        let url = self.endpoint();

        tracing::debug!(
            model = %self.model,
            input_items = input.len(),
            tools = tools.len(),
            chained = previous_response_id.is_some(),
            "sending responses request"
        );

        let response = send_with_retry("openai", MAX_RETRIES, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("OpenAI API error {status}: {text}");
            return Err(LlmError::Api {
                provider: "openai".into(),
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: ModelResponse = serde_json::from_str(&text)?;
        tracing::debug!(
            response_id = %parsed.id,
            output_items = parsed.output.len(),
            function_calls = parsed.function_call_count(),
            "received responses output"
        );
        Ok(parsed)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.to_owned())
}
