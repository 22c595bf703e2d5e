//! MCP server descriptors, transports, sessions, and the merged tool catalog.

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod manager;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod session;
pub mod tool;
pub mod transport;

pub use catalog::ToolCatalog;
pub use descriptor::{Descriptors, McpTransport, ServerDescriptor, load_descriptors};
pub use error::{DescriptorError, McpError};
pub use manager::{Connector, McpManager, RmcpConnector, UnloadReport};
pub use session::{McpSession, ToolOutput, ToolSession};
pub use tool::{ToolSpec, normalize_schema};
