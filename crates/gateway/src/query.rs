//! Per-request overrides carried in the query string.

use scribe_agent::ChatRunOptions;
use scribe_providers::Gateway;
use std::path::PathBuf;

/// Options a request may override. Unset fields keep the server default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOverrides {
    pub model: Option<String>,
    pub gateway: Option<String>,
    pub output_only: Option<bool>,
    pub include_reasoning: Option<bool>,
    pub reasoning_effort: Option<String>,
    pub include_tool: Option<String>,
    pub tools_placement: Option<String>,
    pub default_tools: Option<bool>,
    pub temperature: Option<String>,
    pub tools: Vec<String>,
    pub preamble: Vec<String>,
}

impl RequestOverrides {
    /// Read overrides from a raw query string. Unknown keys are ignored;
    /// boolean flags are true only when spelled `true`.
    pub fn parse(query: &str) -> Self {
        let mut overrides = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "model" => overrides.model = Some(value),
                "gateway" => overrides.gateway = Some(value),
                "output-only" => overrides.output_only = Some(value == "true"),
                "include-reasoning" => overrides.include_reasoning = Some(value == "true"),
                "reasoning-effort" => overrides.reasoning_effort = Some(value),
                "include-tool" => overrides.include_tool = Some(value),
                "tools-placement" => overrides.tools_placement = Some(value),
                "default-tools" => overrides.default_tools = Some(value == "true"),
                "temperature" => overrides.temperature = Some(value),
                "tools" if !value.is_empty() => overrides.tools.push(value),
                "preamble" if !value.is_empty() => overrides.preamble.push(value),
                _ => {}
            }
        }
        overrides
    }

    /// Apply on top of the server defaults.
    ///
    /// Repeated `tools` / `preamble` replace the default lists rather than
    /// extending them.
    pub fn apply(&self, gateway: Gateway, defaults: &ChatRunOptions) -> Result<(Gateway, ChatRunOptions), String> {
        let mut options = defaults.clone();
        let gateway = match &self.gateway {
            Some(name) => name.parse().map_err(|e: scribe_core::ProviderError| e.to_string())?,
            None => gateway,
        };

        if let Some(model) = &self.model {
            options.model = model.clone();
        }
        if let Some(output_only) = self.output_only {
            options.output_only = output_only;
        }
        if let Some(include_reasoning) = self.include_reasoning {
            options.include_reasoning = include_reasoning;
        }
        if let Some(effort) = &self.reasoning_effort {
            options.reasoning_effort = Some(effort.parse()?);
        }
        if let Some(mode) = &self.include_tool {
            options.include_tool = mode.parse()?;
        }
        if let Some(placement) = &self.tools_placement {
            options.tools_placement = placement.parse()?;
        }
        if let Some(default_tools) = self.default_tools {
            options.omit_tools = !default_tools;
        }
        if let Some(temperature) = &self.temperature {
            options.temperature = Some(
                temperature
                    .parse()
                    .map_err(|_| format!("invalid temperature '{temperature}'"))?,
            );
        }
        if !self.tools.is_empty() {
            options.tools = self.tools.iter().map(PathBuf::from).collect();
        }
        if !self.preamble.is_empty() {
            options.preamble = self.preamble.iter().map(PathBuf::from).collect();
        }
        Ok((gateway, options))
    }
}
