//! Gateway catalog: the completion backends Scribe knows how to reach.

use crate::openai_compat::OpenAiCompatProvider;
use scribe_config::GatewayOverride;
use scribe_core::error::ProviderError;
use scribe_core::message::AudioFormat;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const COPILOT_HEADERS: &[(&str, &str)] = &[
    ("User-Agent", "GitHubCopilotChat/0.31.2"),
    ("Editor-Version", "vscode/1.104.1"),
    ("Editor-Plugin-Version", "copilot-chat/0.31.2"),
    ("Copilot-Integration-Id", "vscode-chat"),
];

/// A known OpenAI-compatible gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gateway {
    Ollama,
    OpenRouter,
    Gemini,
    Anthropic,
    OpenAi,
    DeepSeek,
    Moonshot,
    Copilot,
}

impl Gateway {
    pub const ALL: [Gateway; 8] = [
        Gateway::Ollama,
        Gateway::OpenRouter,
        Gateway::Gemini,
        Gateway::Anthropic,
        Gateway::OpenAi,
        Gateway::DeepSeek,
        Gateway::Moonshot,
        Gateway::Copilot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Ollama => "ollama",
            Gateway::OpenRouter => "openrouter",
            Gateway::Gemini => "gemini",
            Gateway::Anthropic => "anthropic",
            Gateway::OpenAi => "openai",
            Gateway::DeepSeek => "deepseek",
            Gateway::Moonshot => "moonshot",
            Gateway::Copilot => "copilot",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Gateway::Ollama => "http://localhost:11434/v1",
            Gateway::OpenRouter => "https://openrouter.ai/api/v1",
            Gateway::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai/",
            Gateway::Anthropic => "https://api.anthropic.com/v1/",
            Gateway::OpenAi => "https://api.openai.com/v1",
            Gateway::DeepSeek => "https://api.deepseek.com/beta",
            Gateway::Moonshot => "https://api.moonshot.ai/v1",
            Gateway::Copilot => "https://api.githubcopilot.com",
        }
    }

    /// Environment variable holding the API key. Ollama needs none.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Gateway::Ollama => None,
            Gateway::OpenRouter => Some("OPENROUTER_API_KEY"),
            Gateway::Gemini => Some("GEMINI_API_KEY"),
            Gateway::Anthropic => Some("ANTHROPIC_API_KEY"),
            Gateway::OpenAi => Some("OPENAI_API_KEY"),
            Gateway::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Gateway::Moonshot => Some("MOONSHOT_API_KEY"),
            Gateway::Copilot => Some("GITHUB_COPILOT_TOKEN"),
        }
    }

    pub fn audio_format(&self) -> AudioFormat {
        match self {
            Gateway::Gemini => AudioFormat::Gemini,
            _ => AudioFormat::OpenAi,
        }
    }

    pub fn headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Gateway::Copilot => COPILOT_HEADERS,
            _ => &[],
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gateway {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gateway::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<_> = Gateway::ALL.iter().map(Gateway::as_str).collect();
                ProviderError::NotConfigured(format!("unknown gateway '{s}' (known: {})", known.join(", ")))
            })
    }
}

/// Build a provider for `gateway` using the process environment for the key.
pub fn build_provider(
    gateway: Gateway,
    overrides: Option<&GatewayOverride>,
) -> Result<OpenAiCompatProvider, ProviderError> {
    build_provider_with(gateway, overrides, |key| std::env::var(key).ok())
}

/// Build a provider, resolving the API key through `lookup`.
///
/// A configured key or URL override takes precedence over the catalog.
pub fn build_provider_with(
    gateway: Gateway,
    overrides: Option<&GatewayOverride>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<OpenAiCompatProvider, ProviderError> {
    let api_key = match (overrides.and_then(|o| o.api_key.clone()), gateway.api_key_env()) {
        (Some(key), _) => key,
        (None, None) => "ollama".to_string(),
        (None, Some(env)) => lookup(env).filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            ProviderError::NotConfigured(format!("API key not found for {gateway}: set {env}"))
        })?,
    };
    let base_url = overrides
        .and_then(|o| o.api_url.as_deref())
        .unwrap_or(gateway.base_url());

    debug!(gateway = %gateway, base_url, "Building provider");

    let provider = OpenAiCompatProvider::new(gateway.as_str(), base_url, api_key)?
        .with_audio_format(gateway.audio_format());
    Ok(gateway
        .headers()
        .iter()
        .fold(provider, |p, (k, v)| p.with_header(*k, *v)))
}
