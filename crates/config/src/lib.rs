//! Configuration loading and validation for Scribe.
//!
//! Loads configuration from `~/.scribe/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.scribe/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway used when none is given on the command line
    #[serde(default = "default_gateway")]
    pub default_gateway: String,

    /// Model used when none is given on the command line
    #[serde(default = "default_model")]
    pub default_model: String,

    /// How many tool-call rounds a single run may go through
    #[serde(default = "default_max_tool_depth")]
    pub max_tool_depth: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Tool-activity block limits
    #[serde(default)]
    pub tool_block: ToolBlockConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub serve: ServeConfig,

    /// Tools file used when neither `tools.yaml` nor `tools.yml` exist in the
    /// working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_tools_path: Option<PathBuf>,

    /// Per-gateway overrides (API key, base URL)
    #[serde(default)]
    pub gateways: HashMap<String, GatewayOverride>,
}

fn default_gateway() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4.5".into()
}
fn default_max_tool_depth() -> u32 {
    20
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_gateway", &self.default_gateway)
            .field("default_model", &self.default_model)
            .field("max_tool_depth", &self.max_tool_depth)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("tool_block", &self.tool_block)
            .field("serve", &self.serve)
            .field("default_tools_path", &self.default_tools_path)
            .field("gateways", &self.gateways)
            .finish()
    }
}

impl std::fmt::Debug for GatewayOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayOverride")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToolBlockConfig {
    #[serde(default = "default_max_per_result_chars")]
    pub max_per_result_chars: usize,

    #[serde(default = "default_max_total_chars")]
    pub max_total_chars: usize,
}

fn default_max_per_result_chars() -> usize {
    22_000
}
fn default_max_total_chars() -> usize {
    60_000
}

impl Default for ToolBlockConfig {
    fn default() -> Self {
        Self {
            max_per_result_chars: default_max_per_result_chars(),
            max_total_chars: default_max_total_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3535
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewayOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.scribe/config.toml).
    ///
    /// Environment overrides:
    /// - `SCRIBE_GATEWAY`
    /// - `SCRIBE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(gateway) = lookup("SCRIBE_GATEWAY").filter(|v| !v.is_empty()) {
            self.default_gateway = gateway;
        }
        if let Some(model) = lookup("SCRIBE_MODEL").filter(|v| !v.is_empty()) {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".scribe")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if self.max_tool_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_tool_depth must be at least 1".into(),
            ));
        }

        if self.tool_block.max_total_chars < 64 {
            return Err(ConfigError::ValidationError(
                "tool_block.max_total_chars must be at least 64".into(),
            ));
        }

        Ok(())
    }

    /// Overrides configured for a gateway, if any.
    pub fn gateway_override(&self, gateway: &str) -> Option<&GatewayOverride> {
        self.gateways.get(gateway)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_gateway: default_gateway(),
            default_model: default_model(),
            max_tool_depth: default_max_tool_depth(),
            max_tokens: None,
            temperature: None,
            tool_block: ToolBlockConfig::default(),
            serve: ServeConfig::default(),
            default_tools_path: None,
            gateways: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for scribe_core::Error {
    fn from(e: ConfigError) -> Self {
        scribe_core::Error::Config {
            message: e.to_string(),
        }
    }
}
