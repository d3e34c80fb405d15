//! Tool execution for Scribe.
//!
//! Tools come from YAML tools files and run in one of two ways:
//! a bash command template executed as a subprocess, or a tool exposed
//! by a remote server spoken to over its standard streams.

pub mod bash;
pub mod config;
pub mod registry;
pub mod remote;

pub use bash::format_command;
pub use config::{parse_tools_config, resolve_auto_tools_path, BashToolConfig, RemoteServerConfig, ToolsFile};
pub use registry::{ToolExecutor, ToolSet};
pub use remote::{RemoteClient, RemoteTool};
