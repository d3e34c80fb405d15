//! Turn headers: the `X>>` lines that divide a document into turns.

use crate::interpolate::{interpolate, InterpolationContext};
use regex::Regex;
use scribe_core::{Content, ContentError, Error, Role, Session, Turn};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\w)>>").expect("header regex is valid"));

/// Parse the main region of a document into a session.
///
/// Text before the first header is a system preface when the document
/// opens with a question (`Q>>`), and is the opening question otherwise.
/// Turns are trimmed; empty turns and unknown headers are dropped. User
/// turns go through reference interpolation.
pub fn parse(main: &str, ctx: &InterpolationContext) -> Result<Session, ContentError> {
    let mut chunks: Vec<(Option<&str>, &str)> = Vec::new();
    let mut key = None;
    let mut cursor = 0;
    for caps in HEADER.captures_iter(main) {
        let (Some(whole), Some(letter)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        chunks.push((key, &main[cursor..whole.start()]));
        key = Some(letter.as_str());
        cursor = whole.end();
    }
    chunks.push((key, &main[cursor..]));

    let first_header = chunks.get(1).and_then(|(k, _)| *k);
    let preface = if first_header == Some("Q") { "S" } else { "Q" };

    let mut session = Session::new();
    for (key, raw) in chunks {
        let content = raw.trim();
        if content.is_empty() {
            continue;
        }
        let Some(role) = Role::from_header(key.unwrap_or(preface)) else {
            tracing::debug!(header = key, "Skipping turn with unknown header");
            continue;
        };
        let turn = match role {
            Role::User => Turn::user(Content::from_parts(interpolate(content, ctx)?)),
            Role::System => Turn::system(content),
            _ => Turn::assistant(content),
        };
        session.push(turn);
    }
    Ok(session)
}

/// Render a session back to headered text.
///
/// Only system, user and plain assistant turns are shown. The first turn
/// needs no header when it is a system or user turn.
pub fn serialize(session: &Session) -> String {
    let turns = session.turns();
    let mut out = String::new();
    for (i, turn) in turns.iter().enumerate().rev() {
        let visible = match turn.role {
            Role::System | Role::User => true,
            Role::Assistant => turn.tool_calls.is_empty(),
            Role::Tool => false,
        };
        if !visible {
            continue;
        }
        let implied = i == 0 && matches!(turn.role, Role::System | Role::User);
        let mut block = String::new();
        if !implied {
            block.push_str(turn.role.header());
            block.push_str(">>\n\n");
        }
        block.push_str(&turn.text());
        block.push_str("\n\n");
        out.insert_str(0, &block);
    }
    out
}

/// Prefix the contents of `paths` onto `main`, joined by blank lines.
pub async fn include_preamble(paths: &[PathBuf], main: &str) -> scribe_core::Result<String> {
    if paths.is_empty() {
        return Ok(main.to_string());
    }
    let mut pieces = Vec::with_capacity(paths.len() + 1);
    for path in paths {
        pieces.push(read_preamble(path).await?);
    }
    pieces.push(main.to_string());
    Ok(pieces.join("\n\n"))
}

async fn read_preamble(path: &Path) -> scribe_core::Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| Error::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
