//! Error types for the Scribe domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Scribe operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Content interpolation errors ---
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Agent loop ---
    #[error("Too many tool call rounds: depth {depth} exceeds the limit of {limit}")]
    TooManyToolCalls { depth: u32, limit: u32 },

    #[error("Run cancelled")]
    Cancelled,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- I/O ---
    #[error("I/O error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Failures while expanding inline references in a user turn.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Unsupported {kind} reference: {reference}")]
    UnsupportedReference { kind: String, reference: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to connect to remote tool server \"{server}\": {reason}")]
    Connect { server: String, reason: String },

    #[error("Remote tool server \"{0}\" not found")]
    ServerNotFound(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms and was cancelled")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool cancelled: {0}")]
    Cancelled(String),

    #[error("Missing parameter {name} in command {command}")]
    MissingParameter { name: String, command: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid tools configuration in {source_name}: {reason}")]
    InvalidConfig { source_name: String, reason: String },

    #[error("Protocol error from \"{server}\": {reason}")]
    Protocol { server: String, reason: String },
}

impl ToolError {
    /// Whether this failure came from a deadline rather than the tool itself.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn missing_parameter_names_the_parameter() {
        let err = ToolError::MissingParameter {
            name: "foo".into(),
            command: "echo {{foo}}".into(),
        };
        assert_eq!(err.to_string(), "Missing parameter foo in command echo {{foo}}");
    }

    #[test]
    fn timeout_is_recognised() {
        let err = ToolError::Timeout {
            tool_name: "slow".into(),
            timeout_ms: 50,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));
        assert!(!ToolError::NotFound("x".into()).is_timeout());
    }

    #[test]
    fn too_many_tool_calls_reports_limit() {
        let err = Error::TooManyToolCalls { depth: 4, limit: 3 };
        assert!(err.to_string().contains("limit of 3"));
    }
}
