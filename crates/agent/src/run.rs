//! One document in, one document out.

use crate::loop_runner::AgentLoop;
use scribe_config::AppConfig;
use scribe_core::provider::{Provider, ReasoningEffort};
use scribe_core::{Error, Result, ToolError};
use scribe_session::{
    include_preamble, parse, recombine, split, BlockLimits, IncludeToolMode, InterpolationContext, RecombineOptions,
    ToolsPlacement,
};
use scribe_tools::{resolve_auto_tools_path, ToolSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a single run can be told.
#[derive(Debug, Clone)]
pub struct ChatRunOptions {
    pub model: String,
    /// Tools files loaded after the auto-discovered one
    pub tools: Vec<PathBuf>,
    /// Files prefixed onto the conversation before parsing
    pub preamble: Vec<PathBuf>,
    /// Skip `tools.yaml` auto-discovery
    pub omit_tools: bool,
    /// Fallback for auto-discovery when the working directory has no tools file
    pub default_tools_path: Option<PathBuf>,
    /// Directory for auto-discovery and relative references (process cwd when unset)
    pub cwd: Option<PathBuf>,
    pub output_only: bool,
    pub include_reasoning: bool,
    pub include_tool: IncludeToolMode,
    pub tools_placement: ToolsPlacement,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_tool_depth: u32,
    pub limits: BlockLimits,
}

impl Default for ChatRunOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ChatRunOptions {
    /// Options seeded from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            tools: Vec::new(),
            preamble: Vec::new(),
            omit_tools: false,
            default_tools_path: config.default_tools_path.clone(),
            cwd: None,
            output_only: false,
            include_reasoning: false,
            include_tool: IncludeToolMode::default(),
            tools_placement: ToolsPlacement::default(),
            reasoning_effort: None,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_tool_depth: config.max_tool_depth,
            limits: BlockLimits {
                max_per_result_chars: config.tool_block.max_per_result_chars,
                max_total_chars: config.tool_block.max_total_chars,
            },
        }
    }

    /// The tools files for this run: the auto-discovered one unless
    /// omitted, then the explicit ones in order.
    pub fn tool_paths(&self) -> Vec<PathBuf> {
        let cwd = self.cwd.as_deref().unwrap_or(Path::new("."));
        let auto = if self.omit_tools {
            None
        } else {
            resolve_auto_tools_path(cwd, self.default_tools_path.as_deref())
        };
        auto.into_iter().chain(self.tools.iter().cloned()).collect()
    }

    fn recombine_options(&self) -> RecombineOptions {
        RecombineOptions {
            output_only: self.output_only,
            include_reasoning: self.include_reasoning,
            include_tool: self.include_tool,
            tools_placement: self.tools_placement,
            limits: self.limits,
        }
    }
}

/// Run one chat turn over `text` and return the updated document.
pub async fn run_chat(text: &str, options: &ChatRunOptions, provider: Arc<dyn Provider>) -> Result<String> {
    run_chat_with_cancel(text, options, provider, &CancellationToken::new()).await
}

/// [`run_chat`] that stops early when `cancel` fires.
///
/// Remote tool servers are disconnected whether or not the run succeeds.
/// On failure no partial document is produced.
pub async fn run_chat_with_cancel(
    text: &str,
    options: &ChatRunOptions,
    provider: Arc<dyn Provider>,
    cancel: &CancellationToken,
) -> Result<String> {
    let envelope = split(text);
    let prompt = include_preamble(&options.preamble, &envelope.main).await?;

    let ctx = InterpolationContext {
        audio_format: provider.audio_format(),
        base_dir: options.cwd.clone(),
    };
    let mut session = parse(&prompt, &ctx)?;
    debug!(turns = session.len(), "Parsed document");

    let paths = options.tool_paths();
    let mut tools = if paths.is_empty() {
        ToolSet::new()
    } else {
        match ToolSet::load(&paths, cancel).await {
            Err(ToolError::Cancelled(_)) => return Err(Error::Cancelled),
            loaded => loaded?,
        }
    };

    let outcome = AgentLoop::new(provider, options.model.clone(), &tools)
        .with_max_depth(options.max_tool_depth)
        .with_max_tokens(options.max_tokens)
        .with_temperature(options.temperature)
        .with_reasoning(options.include_reasoning, options.reasoning_effort)
        .process(&mut session, cancel)
        .await;
    tools.shutdown().await;
    outcome?;

    info!(turns = session.len(), "Run complete");

    let output = recombine(&envelope.main, &session, &options.recombine_options());
    Ok(envelope.rebuild(&output))
}
