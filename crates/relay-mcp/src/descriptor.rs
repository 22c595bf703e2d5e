//! Server descriptor file loading.
//!
//! The file is JSON of the shape `{"mcpServers": {label: entry}}`, where an
//! entry is either process-shaped (`command`, `args`, `env`) or url-shaped
//! (`url`, optional `type` and `trusted`). Declaration order is preserved.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{DescriptorError, McpError};

/// How a server is reached. Decided once when the descriptor is loaded.
#[derive(Clone, PartialEq, Eq)]
pub enum McpTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    /// Legacy MCP-over-SSE: a GET event stream plus POSTs to an announced endpoint.
    Sse { url: String },
    /// Streamable HTTP.
    Http { url: String },
    /// Reached by the model API itself; advertised but never opened locally.
    Hosted { url: String, trusted: bool },
}

impl McpTransport {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Sse { .. } => "sse",
            Self::Http { .. } => "http",
            Self::Hosted { .. } => "hosted",
        }
    }
}

impl fmt::Debug for McpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio { command, args, env } => f
                .debug_struct("Stdio")
                .field("command", command)
                .field("args", args)
                .field("env", &env.keys().collect::<Vec<_>>())
                .finish(),
            Self::Sse { url } => f.debug_struct("Sse").field("url", url).finish(),
            Self::Http { url } => f.debug_struct("Http").field("url", url).finish(),
            Self::Hosted { url, trusted } => f
                .debug_struct("Hosted")
                .field("url", url)
                .field("trusted", trusted)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub id: String,
    pub transport: McpTransport,
}

/// Result of loading a descriptor file: usable servers plus rejected entries.
#[derive(Debug, Default)]
pub struct Descriptors {
    pub servers: Vec<ServerDescriptor>,
    pub rejected: Vec<McpError>,
}

#[derive(Deserialize)]
struct DescriptorFile {
    #[serde(rename = "mcpServers")]
    mcp_servers: Option<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawEntry {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default = "default_trusted")]
    trusted: bool,
}

fn default_trusted() -> bool {
    true
}

impl ServerDescriptor {
    /// Interpret one `mcpServers` entry.
    ///
    /// # Errors
    ///
    /// Returns `McpError::InvalidDescriptor` when the entry is neither
    /// process-shaped nor url-shaped, names an unknown `type`, or carries a
    /// malformed URL.
    pub fn from_entry(id: &str, entry: Value) -> Result<Self, McpError> {
        let invalid = |message: String| McpError::InvalidDescriptor {
            server_id: id.to_owned(),
            message,
        };
        let raw: RawEntry = serde_json::from_value(entry).map_err(|e| invalid(e.to_string()))?;

        let transport = match (raw.command, raw.url) {
            (Some(_), Some(_)) => {
                return Err(invalid("entry has both 'command' and 'url'".into()));
            }
            (Some(command), None) => {
                if command.trim().is_empty() {
                    return Err(invalid("'command' is empty".into()));
                }
                McpTransport::Stdio {
                    command,
                    args: raw.args,
                    env: raw.env,
                }
            }
            (None, Some(url)) => {
                Url::parse(&url).map_err(|e| invalid(format!("bad url '{url}': {e}")))?;
                match raw.kind.as_deref() {
                    None | Some("sse") => McpTransport::Sse { url },
                    Some("http" | "streamable-http" | "streamable_http") => {
                        McpTransport::Http { url }
                    }
                    Some("openai" | "hosted") => McpTransport::Hosted {
                        url,
                        trusted: raw.trusted,
                    },
                    Some(other) => return Err(invalid(format!("unknown type '{other}'"))),
                }
            }
            (None, None) => return Err(invalid("entry has neither 'command' nor 'url'".into())),
        };

        Ok(Self {
            id: id.to_owned(),
            transport,
        })
    }
}

/// Read and interpret a descriptor file.
///
/// Invalid individual entries are logged and returned in `rejected`; the
/// remaining entries still load.
///
/// # Errors
///
/// Returns a `DescriptorError` when the file is missing, unreadable, not
/// valid JSON, lacks `mcpServers`, or declares no servers.
pub fn load_descriptors(path: &Path) -> Result<Descriptors, DescriptorError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DescriptorError::NotFound {
                path: path.to_owned(),
            }
        } else {
            DescriptorError::Read {
                path: path.to_owned(),
                source: e,
            }
        }
    })?;
    parse_descriptors(&text, path)
}

fn parse_descriptors(text: &str, path: &Path) -> Result<Descriptors, DescriptorError> {
    let file: DescriptorFile =
        serde_json::from_str(text).map_err(|source| DescriptorError::Parse {
            path: path.to_owned(),
            source,
        })?;
    let entries = file
        .mcp_servers
        .ok_or_else(|| DescriptorError::MissingServers {
            path: path.to_owned(),
        })?;
    if entries.is_empty() {
        return Err(DescriptorError::Empty {
            path: path.to_owned(),
        });
    }

    let mut descriptors = Descriptors::default();
    for (id, entry) in entries {
        match ServerDescriptor::from_entry(&id, entry) {
            Ok(descriptor) => {
                tracing::debug!(
                    server_id = %descriptor.id,
                    transport = descriptor.transport.kind(),
                    "loaded server descriptor"
                );
                descriptors.servers.push(descriptor);
            }
            Err(e) => {
                tracing::warn!(server_id = %id, "skipping server descriptor: {e}");
                descriptors.rejected.push(e);
            }
        }
    }
    Ok(descriptors)
}
