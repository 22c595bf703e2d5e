#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Llm(#[from] relay_llm::LlmError),

    #[error("invalid arguments for tool '{tool_name}' (call {call_id}): {source}")]
    ArgumentDecode {
        call_id: String,
        tool_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("tool round limit of {limit} reached without a final answer")]
    RoundLimit { limit: usize },
}
