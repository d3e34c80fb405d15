//! Remote tool client: an MCP client over a child process' stdio.
//!
//! One client per configured server. The protocol itself (framing, request
//! ids, the `initialize` handshake) is handled by `rmcp`; this module maps
//! its tools and results into Scribe's types. Anything the child writes to
//! stderr is drained and only logged at trace level.

use rmcp::model::{
    CallToolRequest, CallToolRequestParam, CallToolResult, CancelledNotificationParam, ClientCapabilities, ClientInfo,
    ClientRequest, Implementation, ProtocolVersion, RawContent, ServerResult,
};
use rmcp::service::{PeerRequestOptions, RunningService, ServiceError};
use rmcp::transport::{IntoTransport, TokioChildProcess};
use rmcp::{ClientHandler, RoleClient};
use scribe_core::ToolError;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A tool exposed by a remote server.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl From<rmcp::model::Tool> for RemoteTool {
    fn from(tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()),
            input_schema: Value::Object((*tool.input_schema).clone()),
        }
    }
}

#[derive(Clone)]
struct ScribeClientHandler {
    info: ClientInfo,
}

impl ClientHandler for ScribeClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: ProtocolVersion::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "scribe".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
    }
}

/// A live connection to one remote tool server.
pub struct RemoteClient {
    name: String,
    service: RunningService<RoleClient, ScribeClientHandler>,
}

impl RemoteClient {
    /// Spawn the server process and perform the protocol handshake.
    ///
    /// The server runs in its own process group so an interrupt aimed at
    /// Scribe does not reach it before it is closed.
    pub async fn connect(name: &str, command: &str, args: &[String]) -> Result<Self, ToolError> {
        let mut cmd = Command::new(command);
        cmd.args(args).kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let (transport, stderr) = TokioChildProcess::builder(cmd)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::Connect {
                server: name.to_string(),
                reason: format!("failed to spawn {command}: {e}"),
            })?;

        if let Some(stderr) = stderr {
            let server = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(server = %server, "{line}");
                }
            });
        }

        let client = Self::handshake(name, transport).await?;
        debug!(server = name, "Connected to remote tool server");
        Ok(client)
    }

    /// Perform the handshake over an already open transport.
    pub async fn handshake<T, E, A>(name: &str, transport: T) -> Result<Self, ToolError>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let handler = ScribeClientHandler { info: client_info() };
        let service = rmcp::serve_client(handler, transport)
            .await
            .map_err(|e| ToolError::Connect {
                server: name.to_string(),
                reason: format!("handshake failed: {e}"),
            })?;
        Ok(Self {
            name: name.to_string(),
            service,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All tools the server exposes, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, ToolError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| self.protocol(format!("tools/list failed: {e}")))?;
        Ok(tools.into_iter().map(RemoteTool::from).collect())
    }

    /// Call a tool and flatten its content into text.
    ///
    /// When `cancel` fires, the pending request is dropped and the server is
    /// told to stop working on it.
    pub async fn call_tool(&self, tool: &str, arguments: Value, cancel: &CancellationToken) -> Result<String, ToolError> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => return Err(ToolError::InvalidArguments(format!("{tool}: expected an object, got {other}"))),
        };
        let request = ClientRequest::CallToolRequest(CallToolRequest::new(CallToolRequestParam {
            meta: None,
            name: tool.to_string().into(),
            arguments,
            task: None,
        }));

        let handle = self
            .service
            .send_cancellable_request(request, PeerRequestOptions::no_options())
            .await
            .map_err(|e| self.call_error(tool, e))?;
        let request_id = handle.id.clone();

        let response = tokio::select! {
            response = handle.await_response() => response,
            _ = cancel.cancelled() => {
                let params = CancelledNotificationParam {
                    request_id,
                    reason: Some("cancelled by client".to_string()),
                };
                if let Err(e) = self.service.notify_cancelled(params).await {
                    debug!(server = %self.name, error = %e, "Could not send cancellation");
                }
                return Err(ToolError::Cancelled(format!("{}/{tool}", self.name)));
            }
        };

        match response.map_err(|e| self.call_error(tool, e))? {
            ServerResult::CallToolResult(result) => self.flatten(tool, result),
            other => Err(self.protocol(format!("unexpected tools/call response: {other:?}"))),
        }
    }

    /// Close the connection. Closing the transport ends the child process.
    pub async fn close(self) -> Result<(), ToolError> {
        let name = self.name;
        self.service.cancel().await.map_err(|e| ToolError::Protocol {
            server: name.clone(),
            reason: format!("close failed: {e}"),
        })?;
        debug!(server = %name, "Closed remote tool server");
        Ok(())
    }

    /// Join content items with newlines: text verbatim, anything else as JSON.
    fn flatten(&self, tool: &str, result: CallToolResult) -> Result<String, ToolError> {
        let text = result
            .content
            .iter()
            .map(|item| match &item.raw {
                RawContent::Text(text) => text.text.clone(),
                _ => serde_json::to_string(item).unwrap_or_else(|e| format!("<unprintable content: {e}>")),
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error.unwrap_or(false) {
            return Err(ToolError::ExecutionFailed {
                tool_name: format!("{}/{tool}", self.name),
                reason: text,
            });
        }
        Ok(text)
    }

    fn call_error(&self, tool: &str, err: ServiceError) -> ToolError {
        match err {
            ServiceError::McpError(err) => {
                let message = err.message.to_lowercase();
                if message.contains("unknown tool") || message.contains("not found") {
                    ToolError::NotFound(format!("{}/{tool}", self.name))
                } else {
                    ToolError::ExecutionFailed {
                        tool_name: format!("{}/{tool}", self.name),
                        reason: format!("{} (code {})", err.message, err.code.0),
                    }
                }
            }
            other => self.protocol(other.to_string()),
        }
    }

    fn protocol(&self, reason: String) -> ToolError {
        ToolError::Protocol {
            server: self.name.clone(),
            reason,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rmcp::model::{
        Content, ErrorCode, ErrorData, ListToolsResult, PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    };
    use rmcp::service::{RequestContext, RoleServer};
    use rmcp::{ServerHandler, ServiceExt};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// An in-process tool server. Tools are listed over two pages; `slow`
    /// only finishes when the client cancels it, which is reported on
    /// `cancelled`.
    #[derive(Clone)]
    pub(crate) struct FakeServer {
        cancelled: mpsc::UnboundedSender<String>,
    }

    fn tool(name: &'static str, description: Option<&'static str>) -> Tool {
        Tool {
            name: name.into(),
            description: description.map(Into::into),
            input_schema: Arc::new(serde_json::from_value(json!({ "type": "object", "properties": {} })).unwrap()),
            output_schema: None,
            annotations: None,
            icons: None,
            title: None,
            execution: None,
            meta: None,
        }
    }

    impl ServerHandler for FakeServer {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }

        async fn list_tools(
            &self,
            request: Option<PaginatedRequestParam>,
            _context: RequestContext<RoleServer>,
        ) -> Result<ListToolsResult, ErrorData> {
            let second_page = request.and_then(|r| r.cursor).is_some();
            Ok(if second_page {
                ListToolsResult {
                    meta: None,
                    tools: vec![tool("slow", None)],
                    next_cursor: None,
                }
            } else {
                ListToolsResult {
                    meta: None,
                    tools: vec![tool("echo", Some("Echo"))],
                    next_cursor: Some("page2".to_string()),
                }
            })
        }

        async fn call_tool(
            &self,
            request: CallToolRequestParam,
            context: RequestContext<RoleServer>,
        ) -> Result<CallToolResult, ErrorData> {
            let args = request.arguments.unwrap_or_default();
            match request.name.as_ref() {
                "echo" => Ok(CallToolResult::success(vec![
                    Content::text(args.get("text").and_then(Value::as_str).unwrap_or_default().to_string()),
                    Content::image("AAAA", "image/png"),
                ])),
                "fail" => Ok(CallToolResult::error(vec![Content::text("boom")])),
                "slow" => {
                    context.ct.cancelled().await;
                    let _ = self.cancelled.send("slow".to_string());
                    Err(ErrorData::new(ErrorCode::INTERNAL_ERROR, "cancelled", None))
                }
                other => Err(ErrorData::new(
                    ErrorCode::INVALID_PARAMS,
                    format!("Unknown tool: {other}"),
                    None,
                )),
            }
        }
    }

    /// A client connected to a [`FakeServer`] over an in-memory stream.
    pub(crate) async fn connected(name: &str) -> (RemoteClient, mpsc::UnboundedReceiver<String>) {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = mpsc::unbounded_channel();
        let server = FakeServer { cancelled: tx };
        tokio::spawn(async move {
            if let Ok(running) = server.serve(tokio::io::split(server_side)).await {
                let _ = running.waiting().await;
            }
        });
        let client = RemoteClient::handshake(name, tokio::io::split(client_side)).await.unwrap();
        (client, rx)
    }

    #[tokio::test]
    async fn list_tools_follows_pagination() {
        let (client, _cancelled) = connected("fake").await;
        let tools = client.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "slow"]);
        assert_eq!(tools[0].description.as_deref(), Some("Echo"));
        assert_eq!(tools[1].description, None);
        assert_eq!(tools[1].input_schema["type"], "object");
    }

    #[tokio::test]
    async fn call_tool_joins_content_items() {
        let (client, _cancelled) = connected("fake").await;
        let out = client
            .call_tool("echo", json!({ "text": "hi" }), &CancellationToken::new())
            .await
            .unwrap();
        let (text, image) = out.split_once('\n').unwrap();
        assert_eq!(text, "hi");
        let image: Value = serde_json::from_str(image).unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(image["data"], "AAAA");
    }

    #[tokio::test]
    async fn error_results_and_unknown_tools() {
        let (client, _cancelled) = connected("fake").await;
        let err = client
            .call_tool("fail", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { ref reason, .. } if reason == "boom"));

        let err = client
            .call_tool("missing", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(ref name) if name == "fake/missing"));
    }

    #[tokio::test]
    async fn cancellation_reaches_the_server() {
        let (client, mut cancelled) = connected("fake").await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = client.call_tool("slow", json!({}), &cancel).await.unwrap_err();
        assert!(matches!(err, ToolError::Cancelled(ref name) if name == "fake/slow"));

        let seen = tokio::time::timeout(Duration::from_secs(2), cancelled.recv()).await.unwrap();
        assert_eq!(seen.as_deref(), Some("slow"));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let (client, _cancelled) = connected("fake").await;
        let err = client
            .call_tool("echo", json!([1, 2]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn closed_stream_fails_the_handshake() {
        let (client_side, server_side) = tokio::io::duplex(1024);
        drop(server_side);
        let err = RemoteClient::handshake("gone", tokio::io::split(client_side))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::Connect { ref server, .. } if server == "gone"));
    }

    #[tokio::test]
    async fn spawn_failure_is_a_connect_error() {
        let err = RemoteClient::connect("ghost", "/definitely/not/a/binary", &[])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::Connect { ref server, .. } if server == "ghost"));
    }
}
