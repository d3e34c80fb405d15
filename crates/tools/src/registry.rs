//! Tool registry: the catalog advertised to the backend and the
//! name → executor table used to dispatch tool calls.
//!
//! A `ToolSet` lives for one run. Remote clients are connected while
//! loading and must be released with [`ToolSet::shutdown`].

use crate::bash::BashInvocation;
use crate::config::{read_tools_config, BashToolConfig, RemoteServerConfig, ToolsFile};
use crate::remote::{RemoteClient, RemoteTool};
use futures::future::join_all;
use scribe_core::{ToolCall, ToolDefinition, ToolError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn one server and list its tools within its connect deadline.
async fn connect_server(server: &RemoteServerConfig) -> Result<(RemoteClient, Vec<RemoteTool>), ToolError> {
    let deadline_ms = server.connect_timeout_ms();
    let connect = async {
        let client = RemoteClient::connect(&server.name, &server.command, &server.args).await?;
        let tools = client.list_tools().await?;
        Ok::<_, ToolError>((client, tools))
    };
    tokio::time::timeout(Duration::from_millis(deadline_ms), connect)
        .await
        .unwrap_or_else(|_| {
            Err(ToolError::Connect {
                server: server.name.clone(),
                reason: format!("no response within {deadline_ms}ms"),
            })
        })
}

/// How a tool call is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolExecutor {
    Bash {
        command: String,
        stdin_param: Option<String>,
        timeout_ms: Option<u64>,
    },
    Remote {
        server: String,
        tool: String,
        timeout_ms: Option<u64>,
    },
}

impl ToolExecutor {
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            ToolExecutor::Bash { timeout_ms, .. } | ToolExecutor::Remote { timeout_ms, .. } => *timeout_ms,
        }
    }
}

/// The tools available to one run.
#[derive(Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
    executors: HashMap<String, ToolExecutor>,
    clients: HashMap<String, RemoteClient>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tools from the given files, in order, and connect to their
    /// remote servers. A server that fails to connect, or does not list its
    /// tools before its connect deadline, is skipped.
    ///
    /// Returns [`ToolError::Cancelled`] when `cancel` fires while servers
    /// are still connecting.
    pub async fn load(paths: &[PathBuf], cancel: &CancellationToken) -> Result<Self, ToolError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(read_tools_config(path).await?);
        }
        let mut set = Self::from_files(&files);

        let mut servers: Vec<&RemoteServerConfig> = Vec::new();
        for server in files.iter().flat_map(|f| f.servers.iter()) {
            match servers.iter_mut().find(|s| s.name == server.name) {
                Some(existing) => *existing = server,
                None => servers.push(server),
            }
        }

        let connecting = join_all(servers.iter().map(|server| async move { (*server, connect_server(server).await) }));
        let connections = tokio::select! {
            connections = connecting => connections,
            _ = cancel.cancelled() => return Err(ToolError::Cancelled("loading tools".to_string())),
        };

        for (server, connected) in connections {
            match connected {
                Ok((client, tools)) => set.add_remote(client, tools, server.timeout_ms),
                Err(e) => warn!(server = %server.name, error = %e, "Skipping remote tool server"),
            }
        }

        info!(
            tools = set.definitions.len(),
            servers = set.clients.len(),
            "Tools loaded"
        );
        Ok(set)
    }

    /// Build a set holding the bash tools of already parsed files.
    pub fn from_files(files: &[ToolsFile]) -> Self {
        let mut set = Self::new();
        for tool in files.iter().flat_map(|f| f.bash.iter()) {
            set.add_bash(tool);
        }
        set
    }

    pub fn add_bash(&mut self, tool: &BashToolConfig) {
        self.insert(
            tool.definition(),
            ToolExecutor::Bash {
                command: tool.command.clone(),
                stdin_param: tool.stdin_param.clone(),
                timeout_ms: tool.timeout_ms,
            },
        );
    }

    /// Register every tool of a connected server. The set takes ownership
    /// of the client and closes it on shutdown.
    pub fn add_remote(&mut self, client: RemoteClient, tools: Vec<RemoteTool>, timeout_ms: Option<u64>) {
        let server = client.name().to_string();
        for tool in tools {
            self.insert(
                ToolDefinition {
                    name: tool.name.clone(),
                    description: tool.description.unwrap_or_default(),
                    parameters: tool.input_schema,
                },
                ToolExecutor::Remote {
                    server: server.clone(),
                    tool: tool.name,
                    timeout_ms,
                },
            );
        }
        self.clients.insert(server, client);
    }

    fn insert(&mut self, definition: ToolDefinition, executor: ToolExecutor) {
        if self.executors.contains_key(&definition.name) {
            warn!(tool = %definition.name, "Tool defined more than once, the last definition wins");
        }
        self.executors.insert(definition.name.clone(), executor);
        self.definitions.push(definition);
    }

    /// The catalog, in load order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn executor(&self, name: &str) -> Option<&ToolExecutor> {
        self.executors.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Execute one tool call.
    ///
    /// The call gets its own child of `cancel`; when the executor's timeout
    /// expires that token is cancelled and the call is awaited until it has
    /// cleaned up.
    pub async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<String, ToolError> {
        let executor = self
            .executors
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let args = call
            .arguments_object()
            .map_err(|e| ToolError::InvalidArguments(format!("{}: {e}", call.name)))?;

        let token = cancel.child_token();
        let work = self.dispatch(&call.name, executor, &args, &token);
        tokio::pin!(work);

        let Some(timeout_ms) = executor.timeout_ms() else {
            return work.await;
        };
        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut work).await {
            Ok(outcome) => outcome,
            Err(_) => {
                token.cancel();
                let _ = work.await;
                warn!(tool = %call.name, timeout_ms, "Tool timed out");
                Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_ms,
                })
            }
        }
    }

    async fn dispatch(
        &self,
        name: &str,
        executor: &ToolExecutor,
        args: &serde_json::Map<String, serde_json::Value>,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        debug!(tool = name, "Dispatching tool call");
        match executor {
            ToolExecutor::Bash {
                command,
                stdin_param,
                ..
            } => {
                BashInvocation {
                    tool_name: name,
                    command,
                    stdin_param: stdin_param.as_deref(),
                }
                .run(args, cancel)
                .await
            }
            ToolExecutor::Remote { server, tool, .. } => {
                let client = self
                    .clients
                    .get(server)
                    .ok_or_else(|| ToolError::ServerNotFound(server.clone()))?;
                client
                    .call_tool(tool, serde_json::Value::Object(args.clone()), cancel)
                    .await
            }
        }
    }

    /// Close every remote client. Failures are logged and do not stop the
    /// other clients from closing.
    pub async fn shutdown(&mut self) {
        let clients: Vec<RemoteClient> = self.clients.drain().map(|(_, client)| client).collect();
        if clients.is_empty() {
            return;
        }
        for result in join_all(clients.into_iter().map(|client| async move {
            let name = client.name().to_string();
            (name, client.close().await)
        }))
        .await
        {
            if let (name, Err(e)) = result {
                warn!(server = %name, error = %e, "Failed to close remote tool server");
            }
        }
    }
}
