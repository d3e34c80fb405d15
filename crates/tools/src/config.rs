//! Tools file parsing.
//!
//! A tools file is a YAML mapping from tool name to a bash tool
//! definition. The reserved key `_mcp_servers` holds remote tool servers:
//!
//! ```yaml
//! read_file:
//!   description: Read the contents of a file
//!   parameters:
//!     file_path: The path to the file to read
//!   command: "cat {{file_path}}"
//!
//! _mcp_servers:
//!   time:
//!     command: uvx
//!     args: [mcp-server-time]
//!     timeout: 10000
//! ```
//!
//! Timeouts are in milliseconds.

use scribe_core::{argument_to_string, ToolDefinition, ToolError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Key holding the remote tool server descriptors.
pub const REMOTE_SERVERS_KEY: &str = "_mcp_servers";

/// How long a remote server without its own `timeout` gets to start up
/// and list its tools.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// A bash tool as declared in a tools file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BashToolConfig {
    pub name: String,
    pub description: String,
    /// Parameter name → description, in file order
    pub parameters: Vec<(String, String)>,
    /// Command template with `{{param}}` placeholders
    pub command: String,
    /// Argument piped to the command's stdin
    pub stdin_param: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl BashToolConfig {
    /// The catalog entry advertised to the backend. Every parameter is a
    /// required string.
    pub fn definition(&self) -> ToolDefinition {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|(name, description)| {
                (
                    name.clone(),
                    serde_json::json!({ "type": "string", "description": description }),
                )
            })
            .collect();
        let required: Vec<&str> = self.parameters.iter().map(|(name, _)| name.as_str()).collect();

        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// A remote tool server as declared under `_mcp_servers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub timeout_ms: Option<u64>,
}

impl RemoteServerConfig {
    /// Deadline for connecting and listing tools. The server's own
    /// `timeout` applies here too.
    pub fn connect_timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS)
    }
}

/// The enabled entries of one tools file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolsFile {
    pub bash: Vec<BashToolConfig>,
    pub servers: Vec<RemoteServerConfig>,
}

#[derive(Deserialize)]
struct RawBashTool {
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Option<serde_json::Map<String, serde_json::Value>>,
    command: String,
    #[serde(default)]
    stdin_param: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

#[derive(Deserialize)]
struct RawServer {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn invalid(source_name: &str, reason: impl Into<String>) -> ToolError {
    ToolError::InvalidConfig {
        source_name: source_name.to_string(),
        reason: reason.into(),
    }
}

/// Parse the text of one tools file. Disabled entries are left out.
pub fn parse_tools_config(text: &str, source_name: &str) -> Result<ToolsFile, ToolError> {
    let root: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| invalid(source_name, e.to_string()))?;
    let mapping = match root {
        serde_yaml::Value::Null => return Ok(ToolsFile::default()),
        serde_yaml::Value::Mapping(m) => m,
        _ => return Err(invalid(source_name, "expected a mapping of tool names")),
    };

    let mut file = ToolsFile::default();
    for (key, value) in mapping {
        let Some(name) = key.as_str().map(str::to_string) else {
            return Err(invalid(source_name, format!("tool names must be strings, got {key:?}")));
        };

        if name == REMOTE_SERVERS_KEY {
            let servers: serde_yaml::Mapping = match value {
                serde_yaml::Value::Null => continue,
                other => serde_yaml::from_value(other)
                    .map_err(|e| invalid(source_name, format!("{REMOTE_SERVERS_KEY}: {e}")))?,
            };
            for (server_key, server_value) in servers {
                let Some(server_name) = server_key.as_str().map(str::to_string) else {
                    return Err(invalid(source_name, "server names must be strings"));
                };
                let raw: RawServer = serde_yaml::from_value(server_value)
                    .map_err(|e| invalid(source_name, format!("server {server_name}: {e}")))?;
                if !raw.enabled {
                    tracing::debug!(server = %server_name, "Skipping disabled tool server");
                    continue;
                }
                file.servers.push(RemoteServerConfig {
                    name: server_name,
                    command: raw.command,
                    args: raw.args,
                    timeout_ms: raw.timeout,
                });
            }
            continue;
        }

        let raw: RawBashTool = serde_yaml::from_value(value)
            .map_err(|e| invalid(source_name, format!("tool {name}: {e}")))?;
        if !raw.enabled {
            tracing::debug!(tool = %name, "Skipping disabled tool");
            continue;
        }
        let parameters = raw
            .parameters
            .unwrap_or_default()
            .iter()
            .map(|(k, v)| (k.clone(), argument_to_string(v)))
            .collect();
        file.bash.push(BashToolConfig {
            name,
            description: raw.description,
            parameters,
            command: raw.command,
            stdin_param: raw.stdin_param,
            timeout_ms: raw.timeout,
        });
    }
    Ok(file)
}

/// Read and parse a tools file.
pub async fn read_tools_config(path: &Path) -> Result<ToolsFile, ToolError> {
    let source_name = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| invalid(&source_name, e.to_string()))?;
    parse_tools_config(&text, &source_name)
}

/// Pick the tools file used when none is named explicitly:
/// `tools.yaml`, then `tools.yml` in `cwd`, then `default` if it exists.
pub fn resolve_auto_tools_path(cwd: &Path, default: Option<&Path>) -> Option<PathBuf> {
    ["tools.yaml", "tools.yml"]
        .iter()
        .map(|name| cwd.join(name))
        .chain(default.map(Path::to_path_buf))
        .find(|candidate| candidate.is_file())
}
