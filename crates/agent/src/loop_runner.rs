//! The agent reasoning loop implementation.

use futures::future::join_all;
use scribe_core::provider::{Provider, ProviderRequest, ReasoningEffort};
use scribe_core::tool::ToolResult;
use scribe_core::{Error, Result, Session};
use scribe_tools::ToolSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tool-call rounds allowed before a run is aborted.
pub const DEFAULT_MAX_DEPTH: u32 = 20;

/// The agent loop that orchestrates completion calls and tool execution.
pub struct AgentLoop<'a> {
    /// The completion backend
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Tools advertised to the backend and used to execute its calls
    tools: &'a ToolSet,

    /// Maximum tool-call depth per run
    max_depth: u32,

    max_tokens: Option<u32>,
    temperature: Option<f32>,
    include_reasoning: bool,
    reasoning_effort: Option<ReasoningEffort>,
}

impl<'a> AgentLoop<'a> {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: &'a ToolSet) -> Self {
        Self {
            provider,
            model: model.into(),
            tools,
            max_depth: DEFAULT_MAX_DEPTH,
            max_tokens: None,
            temperature: None,
            include_reasoning: false,
            reasoning_effort: None,
        }
    }

    /// Set the maximum tool-call depth.
    pub fn with_max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Ask the backend to return its reasoning text.
    pub fn with_reasoning(mut self, include: bool, effort: Option<ReasoningEffort>) -> Self {
        self.include_reasoning = include;
        self.reasoning_effort = effort;
        self
    }

    fn request(&self, session: &Session) -> ProviderRequest {
        ProviderRequest {
            tools: self.tools.definitions().to_vec(),
            include_reasoning: self.include_reasoning,
            max_tokens: self.max_tokens,
            reasoning_effort: self.reasoning_effort,
            temperature: self.temperature,
            ..ProviderRequest::new(self.model.clone(), session.turns().to_vec())
        }
    }

    /// Drive the session until the backend answers with text.
    ///
    /// Each round that asks for tools appends the assistant's tool-call
    /// turn and one result turn per call, in call order. Failures of
    /// single tool calls are recovered into their result turn. Backend
    /// errors, cancellation and exceeding the depth ceiling are fatal.
    pub async fn process(&self, session: &mut Session, cancel: &CancellationToken) -> Result<()> {
        info!(
            provider = self.provider.name(),
            model = %self.model,
            turns = session.len(),
            tools = self.tools.definitions().len(),
            "Processing session"
        );

        let mut depth: u32 = 0;

        loop {
            if depth > self.max_depth {
                warn!(depth, limit = self.max_depth, "Tool-call depth ceiling exceeded");
                return Err(Error::TooManyToolCalls {
                    depth,
                    limit: self.max_depth,
                });
            }

            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            debug!(depth, "Agent loop iteration");

            let request = self.request(session);
            let response = tokio::select! {
                response = self.provider.complete(request) => response?,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            };

            if let Some(usage) = &response.usage {
                debug!(
                    model = %response.model,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Completion usage"
                );
            }

            if !response.requested_tools() {
                session.extend(response.messages);
                return Ok(());
            }

            let Some(mut turn) = response.messages.into_iter().next() else {
                return Ok(());
            };
            for call in &mut turn.tool_calls {
                if call.ensure_id() {
                    debug!(tool = %call.name, id = %call.id, "Assigned missing tool call id");
                }
            }

            debug!(tool_count = turn.tool_calls.len(), "Executing tool calls");

            let results = join_all(turn.tool_calls.iter().map(|call| async move {
                let outcome = self.tools.execute(call, cancel).await;
                if let Err(e) = &outcome {
                    warn!(tool = %call.name, error = %e, "Tool execution failed");
                }
                ToolResult::from_outcome(call.id.clone(), outcome)
            }))
            .await;

            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            session.push(turn);
            session.extend(results.into_iter().map(ToolResult::into_turn));
            depth += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scribe_core::error::ProviderError;
    use scribe_core::provider::ProviderResponse;
    use scribe_core::{Role, ToolCall, Turn};
    use scribe_tools::parse_tools_config;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Plays back a fixed list of responses and records every request.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<std::result::Result<Vec<Turn>, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<std::result::Result<Vec<Turn>, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let messages = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![Turn::assistant("done")]))?;
            Ok(ProviderResponse {
                messages,
                usage: None,
                model: "scripted-model".into(),
            })
        }
    }

    /// Asks for the same tool forever.
    struct RelentlessProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Provider for RelentlessProvider {
        fn name(&self) -> &str {
            "relentless"
        }

        async fn complete(&self, _request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResponse {
                messages: vec![Turn::assistant_tool_calls(vec![ToolCall::new("", "echo", &json!({"text": "again"}))])],
                usage: None,
                model: "m".into(),
            })
        }
    }

    fn tools(yaml: &str) -> ToolSet {
        ToolSet::from_files(&[parse_tools_config(yaml, "test").unwrap()])
    }

    const ECHO_TOOLS: &str = r#"
echo:
  description: Echo text
  parameters:
    text: what to echo
  command: printf %s {{text}}
slow:
  description: Echo after a pause
  parameters:
    text: what to echo
  command: sleep 0.3; printf %s {{text}}
hang:
  description: Never finishes in time
  command: sleep 5
  timeout: 50
"#;

    #[tokio::test]
    async fn simple_text_response() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![
            Turn::assistant("Hello! How can I help?").with_reasoning("greeting"),
        ])]));
        let tools = ToolSet::new();
        let agent = AgentLoop::new(provider.clone(), "m", &tools);

        let mut session: Session = [Turn::user("Hello!")].into_iter().collect();
        agent.process(&mut session, &CancellationToken::new()).await.unwrap();

        assert_eq!(session.len(), 2);
        let last = session.last().unwrap();
        assert_eq!(last.text(), "Hello! How can I help?");
        assert_eq!(last.reasoning.as_deref(), Some("greeting"));

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn tool_results_follow_call_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(vec![Turn::assistant_tool_calls(vec![
                ToolCall::new("call_slow", "slow", &json!({"text": "first"})),
                ToolCall::new("", "echo", &json!({"text": "second"})),
            ])]),
            Ok(vec![Turn::assistant("Final")]),
        ]));
        let tools = tools(ECHO_TOOLS);
        let agent = AgentLoop::new(provider.clone(), "m", &tools);

        let mut session: Session = [Turn::user("go")].into_iter().collect();
        agent.process(&mut session, &CancellationToken::new()).await.unwrap();

        let turns = session.turns();
        assert_eq!(turns.len(), 5);
        assert!(turns[1].requests_tools());
        let generated_id = turns[1].tool_calls[1].id.clone();
        assert!(!generated_id.is_empty());

        assert_eq!(turns[2].role, Role::Tool);
        assert_eq!(turns[2].tool_call_id.as_deref(), Some("call_slow"));
        assert_eq!(turns[2].text(), "first");
        assert_eq!(turns[3].tool_call_id.as_deref(), Some(generated_id.as_str()));
        assert_eq!(turns[3].text(), "second");
        assert_eq!(turns[4].text(), "Final");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 3);
        assert_eq!(requests[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn tool_failures_are_recovered() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(vec![Turn::assistant_tool_calls(vec![
                ToolCall::new("c1", "hang", &json!({})),
                ToolCall::new("c2", "missing_tool", &json!({})),
                ToolCall::new("c3", "echo", &json!({})),
            ])]),
            Ok(vec![Turn::assistant("Sorry, the tools failed")]),
        ]));
        let tools = tools(ECHO_TOOLS);
        let agent = AgentLoop::new(provider, "m", &tools);

        let mut session: Session = [Turn::user("go")].into_iter().collect();
        agent.process(&mut session, &CancellationToken::new()).await.unwrap();

        let turns = session.turns();
        assert!(turns[2].text().starts_with("Error: "));
        assert!(turns[2].text().contains("timed out"));
        assert!(turns[3].text().contains("Tool not found: missing_tool"));
        assert!(turns[4].text().contains("Missing parameter text"));
        assert_eq!(turns[5].text(), "Sorry, the tools failed");
    }

    #[tokio::test]
    async fn depth_ceiling_stops_tool_ping_pong() {
        let provider = Arc::new(RelentlessProvider {
            calls: AtomicU32::new(0),
        });
        let tools = tools(ECHO_TOOLS);
        let agent = AgentLoop::new(provider.clone(), "m", &tools).with_max_depth(2);

        let mut session: Session = [Turn::user("go")].into_iter().collect();
        let err = agent.process(&mut session, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, Error::TooManyToolCalls { depth: 3, limit: 2 }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn provider_errors_are_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        })]));
        let tools = ToolSet::new();
        let agent = AgentLoop::new(provider, "m", &tools);

        let mut session: Session = [Turn::user("go")].into_iter().collect();
        let err = agent.process(&mut session, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::ApiError { status_code: 500, .. })));
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_completion() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let tools = ToolSet::new();
        let agent = AgentLoop::new(provider, "m", &tools);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut session: Session = [Turn::user("go")].into_iter().collect();
        let err = agent.process(&mut session, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn request_carries_options() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let tools = ToolSet::new();
        let agent = AgentLoop::new(provider.clone(), "the-model", &tools)
            .with_max_tokens(Some(256))
            .with_temperature(Some(0.2))
            .with_reasoning(true, Some(ReasoningEffort::Low));

        let mut session: Session = [Turn::user("go")].into_iter().collect();
        agent.process(&mut session, &CancellationToken::new()).await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "the-model");
        assert_eq!(requests[0].max_tokens, Some(256));
        assert_eq!(requests[0].temperature, Some(0.2));
        assert!(requests[0].include_reasoning);
        assert_eq!(requests[0].reasoning_effort, Some(ReasoningEffort::Low));
    }
}
