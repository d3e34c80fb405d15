//! Tool-activity blocks: a bounded, readable summary of the last round of
//! tool calls, spliced next to the assistant's answer.
//!
//! ```text
//! @@.tools
//! - search_web:
//!   query: berlin
//!   result: |
//!     line one
//!     line two
//! @@
//! ```

use scribe_core::{argument_to_string, Role, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TOOLS_BLOCK_OPEN: &str = "@@.tools\n";
pub const THINK_BLOCK_OPEN: &str = "@@.think\n";
pub const BLOCK_CLOSE: &str = "@@\n";

/// Smallest per-result cap the shrink pass goes down to.
const MIN_RESULT_CAP: usize = 200;
const MAX_SHRINK_ROUNDS: usize = 5;

/// How much tool activity to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeToolMode {
    #[default]
    None,
    /// Tool names and arguments
    Call,
    /// Tool names, arguments and results
    Result,
}

impl fmt::Display for IncludeToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncludeToolMode::None => "none",
            IncludeToolMode::Call => "call",
            IncludeToolMode::Result => "result",
        })
    }
}

impl FromStr for IncludeToolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(IncludeToolMode::None),
            "call" => Ok(IncludeToolMode::Call),
            "result" => Ok(IncludeToolMode::Result),
            other => Err(format!("unknown tool mode '{other}' (expected none, call or result)")),
        }
    }
}

/// Where the tool block goes relative to the answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsPlacement {
    Top,
    #[default]
    Bottom,
}

impl fmt::Display for ToolsPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolsPlacement::Top => "top",
            ToolsPlacement::Bottom => "bottom",
        })
    }
}

impl FromStr for ToolsPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(ToolsPlacement::Top),
            "bottom" => Ok(ToolsPlacement::Bottom),
            other => Err(format!("unknown tools placement '{other}' (expected top or bottom)")),
        }
    }
}

/// Character budgets for a rendered block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLimits {
    pub max_per_result_chars: usize,
    pub max_total_chars: usize,
}

impl Default for BlockLimits {
    fn default() -> Self {
        Self {
            max_per_result_chars: 22_000,
            max_total_chars: 60_000,
        }
    }
}

/// One tool call of the last phase, with its result when one was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallEntry {
    pub name: String,
    /// Arguments in the order the backend sent them, values stringified
    pub params: Vec<(String, String)>,
    pub result: Option<String>,
}

impl ToolCallEntry {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Collect the tool calls that led to the session's final answer.
///
/// Finds the last plain assistant turn, the closest tool-requesting
/// assistant turn before it, and the tool results in between. Returns
/// nothing when the model answered directly.
pub fn extract_last_phase(session: &Session) -> Vec<ToolCallEntry> {
    let turns = session.turns();
    let Some(final_idx) = turns
        .iter()
        .rposition(|t| t.role == Role::Assistant && t.tool_calls.is_empty())
    else {
        return Vec::new();
    };
    let Some(calls_idx) = turns[..final_idx].iter().rposition(|t| t.requests_tools()) else {
        return Vec::new();
    };

    let results: Vec<(&str, String)> = turns[calls_idx + 1..final_idx]
        .iter()
        .filter(|t| t.role == Role::Tool)
        .filter_map(|t| Some((t.tool_call_id.as_deref()?, t.text().into_owned())))
        .collect();

    turns[calls_idx]
        .tool_calls
        .iter()
        .map(|call| {
            let params = match call.arguments_object() {
                Ok(args) => args
                    .iter()
                    .map(|(k, v)| (k.clone(), argument_to_string(v)))
                    .collect(),
                Err(_) => vec![("_raw_arguments".to_string(), call.arguments.clone())],
            };
            let result = results
                .iter()
                .rev()
                .find(|(id, _)| !call.id.is_empty() && *id == call.id)
                .map(|(_, content)| content.clone());
            ToolCallEntry {
                name: call.name.clone(),
                params,
                result,
            }
        })
        .collect()
}

/// Render entries as a tool block. `None` when there is nothing to show.
pub fn render(entries: &[ToolCallEntry], mode: IncludeToolMode, limits: BlockLimits) -> Option<String> {
    if mode == IncludeToolMode::None || entries.is_empty() {
        return None;
    }

    let mut local: Vec<ToolCallEntry> = entries.to_vec();
    match mode {
        IncludeToolMode::Result => {
            for entry in &mut local {
                truncate_result(entry, limits.max_per_result_chars);
            }
        }
        _ => {
            for entry in &mut local {
                entry.result = None;
            }
        }
    }

    let mut body = serialize_entries(&local);
    if char_len(&body) > limits.max_total_chars {
        if mode == IncludeToolMode::Result {
            let mut cap = limits.max_per_result_chars;
            let mut rounds = 0;
            while char_len(&body) > limits.max_total_chars && cap > MIN_RESULT_CAP && rounds < MAX_SHRINK_ROUNDS {
                cap = MIN_RESULT_CAP.max(cap * 7 / 10);
                for entry in &mut local {
                    truncate_result(entry, cap);
                }
                body = serialize_entries(&local);
                rounds += 1;
            }
        }
        if char_len(&body) > limits.max_total_chars {
            let keep = limits.max_total_chars.saturating_sub(64);
            body = format!(
                "{}\n[tools block truncated to {} chars]\n",
                take_chars(&body, keep),
                limits.max_total_chars
            );
        }
    }

    Some(format!("{TOOLS_BLOCK_OPEN}{body}{BLOCK_CLOSE}"))
}

/// Splice the tool block and the reasoning block around the answer.
pub fn insert_tools_block(
    answer: &str,
    tools_block: Option<&str>,
    reasoning: Option<&str>,
    include_reasoning: bool,
    placement: ToolsPlacement,
) -> String {
    let think = match reasoning {
        Some(r) if include_reasoning && !r.is_empty() => format!("\n{THINK_BLOCK_OPEN}{r}\n{BLOCK_CLOSE}\n"),
        _ => String::new(),
    };

    match tools_block {
        None if think.is_empty() => answer.to_string(),
        None => format!("\n{think}{answer}"),
        Some(tools) => match placement {
            ToolsPlacement::Top => format!("{tools}\n{think}{answer}"),
            ToolsPlacement::Bottom => format!("{answer}{think}\n{tools}"),
        },
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn truncate_result(entry: &mut ToolCallEntry, cap: usize) {
    if let Some(result) = &entry.result {
        let total = char_len(result);
        if total > cap {
            entry.result = Some(format!(
                "{}\n[truncated to {cap} chars; total={total}]",
                take_chars(result, cap)
            ));
        }
    }
}

fn needs_quoting(value: &str) -> bool {
    value.contains(':') || value.contains('#')
}

fn push_field(lines: &mut Vec<String>, key: &str, value: &str) {
    if value.contains('\n') {
        lines.push(format!("  {key}: |"));
        lines.extend(value.split('\n').map(|line| format!("    {line}")));
    } else if needs_quoting(value) {
        let quoted = serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
        lines.push(format!("  {key}: {quoted}"));
    } else {
        lines.push(format!("  {key}: {value}"));
    }
}

fn serialize_entries(entries: &[ToolCallEntry]) -> String {
    let mut lines = Vec::new();
    for entry in entries {
        lines.push(format!("- {}:", entry.name));
        for (key, value) in &entry.params {
            push_field(&mut lines, key, value);
        }
        if let Some(result) = &entry.result {
            push_field(&mut lines, "result", result);
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
