//! LLM boundary: Responses API item types, provider trait and backends.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
mod retry;

pub use error::LlmError;
pub use provider::{
    InputItem, LlmProvider, ModelResponse, OutputContent, OutputItem, Role, ToolDefinition,
};
