//! Tool results: what a finished tool call hands back to the session.

use crate::error::ToolError;
use crate::message::Turn;
use serde::{Deserialize, Serialize};

/// The outcome of executing one tool call.
///
/// Failures local to a single call are recovered into a result whose
/// content explains what went wrong, so the backend can react to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub tool_call_id: String,

    /// The output content
    pub content: String,

    /// Whether the content describes a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Recover a failed execution into a result turn's content.
    pub fn failure(tool_call_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: format!("Error: {error}"),
            is_error: true,
        }
    }

    pub fn from_outcome(
        tool_call_id: impl Into<String>,
        outcome: std::result::Result<String, ToolError>,
    ) -> Self {
        match outcome {
            Ok(content) => Self::success(tool_call_id, content),
            Err(e) => Self::failure(tool_call_id, &e),
        }
    }

    /// The `tool` turn appended to the session.
    pub fn into_turn(self) -> Turn {
        Turn::tool_result(self.tool_call_id, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn success_becomes_tool_turn() {
        let turn = ToolResult::success("call_1", "hello world").into_turn();
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(turn.text(), "hello world");
    }

    #[test]
    fn timeout_is_recovered_with_explanation() {
        let result = ToolResult::from_outcome(
            "call_2",
            Err(ToolError::Timeout {
                tool_name: "slow".into(),
                timeout_ms: 50,
            }),
        );
        assert!(result.is_error);
        assert!(result.content.starts_with("Error: "));
        assert!(result.content.contains("timed out"));
    }

    #[test]
    fn missing_tool_is_recovered() {
        let result = ToolResult::from_outcome("call_3", Err(ToolError::NotFound("nope".into())));
        assert_eq!(result.content, "Error: Tool not found: nope");
    }
}
