//! Turn dispatch between an LLM and MCP tool servers, plus config and secrets.

pub mod channel;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod vault;

pub use channel::{Channel, ChannelError, ChannelMessage};
pub use config::Config;
pub use dispatch::{Dispatcher, ToolInvocation, TurnOutcome};
pub use driver::Driver;
pub use error::DispatchError;
pub use vault::{EnvVaultProvider, Secret, VaultProvider};
