//! Run flags shared by `chat` and `serve`.

use clap::Args;
use scribe_agent::ChatRunOptions;
use scribe_config::AppConfig;
use scribe_core::ReasoningEffort;
use scribe_providers::Gateway;
use scribe_session::{IncludeToolMode, ToolsPlacement};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct RunFlags {
    /// Model to use (defaults to the configured model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Gateway provider (defaults to the configured gateway)
    #[arg(short, long)]
    pub gateway: Option<Gateway>,

    /// Tools config file(s), loaded after the auto-discovered one
    #[arg(short, long = "tools")]
    pub tools: Vec<PathBuf>,

    /// Files prepended to the document before it is parsed
    #[arg(short, long = "preamble")]
    pub preamble: Vec<PathBuf>,

    /// Output only the answer instead of the whole document
    #[arg(short, long)]
    pub output_only: bool,

    /// Include the reasoning block in the output, if present
    #[arg(short = 'r', long)]
    pub include_reasoning: bool,

    /// Include a tools block with tool calls or results: none, call, result
    #[arg(long)]
    pub include_tool: Option<IncludeToolMode>,

    /// Where to place the tools block in the answer: top, bottom
    #[arg(long)]
    pub tools_placement: Option<ToolsPlacement>,

    /// Reasoning effort for reasoning models: low, medium, high
    #[arg(long)]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,
}

impl RunFlags {
    /// Resolve the flags against the configuration.
    pub fn resolve(&self, config: &AppConfig) -> Result<(Gateway, ChatRunOptions), Box<dyn std::error::Error>> {
        let gateway = match self.gateway {
            Some(gateway) => gateway,
            None => config.default_gateway.parse()?,
        };

        let mut options = ChatRunOptions::from_config(config);
        if let Some(model) = &self.model {
            options.model = model.clone();
        }
        options.tools = self.tools.clone();
        options.preamble = self.preamble.clone();
        options.output_only = self.output_only;
        options.include_reasoning = self.include_reasoning;
        if let Some(mode) = self.include_tool {
            options.include_tool = mode;
        }
        if let Some(placement) = self.tools_placement {
            options.tools_placement = placement;
        }
        options.reasoning_effort = self.reasoning_effort;
        if self.temperature.is_some() {
            options.temperature = self.temperature;
        }
        Ok((gateway, options))
    }
}
