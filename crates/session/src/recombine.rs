//! Appending the model's final answer to the original document.

use crate::toolblock::{extract_last_phase, insert_tools_block, render, BlockLimits, IncludeToolMode, ToolsPlacement};
use scribe_core::{Role, Session};

/// Shown in place of the answer when the backend returned no text.
pub const EMPTY_ANSWER: &str = "×";

#[derive(Debug, Clone, Copy, Default)]
pub struct RecombineOptions {
    /// Return only the answer instead of the whole document
    pub output_only: bool,
    pub include_reasoning: bool,
    pub include_tool: IncludeToolMode,
    pub tools_placement: ToolsPlacement,
    pub limits: BlockLimits,
}

/// Append the last turn of `session` to `original` as a new `A>>` turn,
/// followed by an empty `Q>>` ready for the next question.
pub fn recombine(original: &str, session: &Session, options: &RecombineOptions) -> String {
    let last = session.last();
    let answer = last
        .map(|t| t.text().into_owned())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| EMPTY_ANSWER.to_string());
    let reasoning = last
        .filter(|t| t.role == Role::Assistant)
        .and_then(|t| t.reasoning.as_deref());

    let entries = extract_last_phase(session);
    let tools_block = render(&entries, options.include_tool, options.limits);
    let output = insert_tools_block(
        &answer,
        tools_block.as_deref(),
        reasoning,
        options.include_reasoning,
        options.tools_placement,
    );

    if options.output_only {
        output
    } else {
        format!("{original}\n\nA>>\n\n{output}\n\nQ>>\n\n")
    }
}
