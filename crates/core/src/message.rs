//! Turn and Session domain types.
//!
//! These are the core value objects that flow through the entire system:
//! document text → parsed Session → agent loop appends turns → document text.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    /// The single-letter header written before a turn of this role (`X>>`).
    pub fn header(&self) -> &'static str {
        match self {
            Role::System => "S",
            Role::User => "Q",
            Role::Assistant => "A",
            Role::Tool => "T",
        }
    }

    /// Map a parsed header letter back to a role.
    ///
    /// Only the headers a person writes are accepted; tool turns are never
    /// read back from a document.
    pub fn from_header(key: &str) -> Option<Self> {
        match key {
            "S" => Some(Role::System),
            "Q" => Some(Role::User),
            "A" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// How a backend expects inline audio to be encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Structured `input_audio` parts.
    #[default]
    OpenAi,
    /// Inline data blobs.
    Gemini,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFormat::OpenAi => f.write_str("openai"),
            AudioFormat::Gemini => f.write_str("gemini"),
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(AudioFormat::OpenAi),
            "gemini" => Ok(AudioFormat::Gemini),
            other => Err(format!("unknown audio format '{other}'")),
        }
    }
}

/// One typed piece of a user turn after inline references were expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text { text: String },

    /// An image, either an external URL or a base64 data URI.
    Image {
        /// The reference as written in the document (path or URL)
        source: String,
        /// URL sent to the backend
        url: String,
        /// Alt text when written as a markdown image
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },

    /// A local text file inlined into the prompt.
    File { path: String, text: String },

    /// A local audio file, base64 encoded.
    Audio {
        path: String,
        mime_type: String,
        extension: String,
        data: String,
        format: AudioFormat,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Render the part back into the inline syntax it was expanded from.
    pub fn to_source_text(&self) -> Cow<'_, str> {
        match self {
            ContentPart::Text { text } => Cow::Borrowed(text),
            ContentPart::Image {
                source,
                alt: Some(alt),
                ..
            } => Cow::Owned(format!("![{alt}]({source})")),
            ContentPart::Image { source, .. } => Cow::Owned(format!("[img[{source}]]")),
            ContentPart::File { path, .. } => Cow::Owned(format!("[txt[{path}]]")),
            ContentPart::Audio { path, .. } => Cow::Owned(format!("[audio[{path}]]")),
        }
    }
}

/// The content of a turn: plain text, or typed parts for interpolated user turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Build content from interpolated parts.
    ///
    /// A single text part collapses to plain text, so reference-free turns
    /// stay plain strings.
    pub fn from_parts(mut parts: Vec<ContentPart>) -> Self {
        if parts.is_empty() {
            return Content::Text(String::new());
        }
        if let [ContentPart::Text { text }] = parts.as_mut_slice() {
            return Content::Text(std::mem::take(text));
        }
        Content::Parts(parts)
    }

    /// Textual view of the content, with parts rendered in their inline syntax.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Content::Text(text) => Cow::Borrowed(text),
            Content::Parts(parts) => {
                Cow::Owned(parts.iter().map(|p| p.to_source_text()).collect())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Parts(parts) => parts.is_empty(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID within the assistant turn (generated when the backend omits it)
    #[serde(default)]
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON object string, exactly as the backend sent them
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: &serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }

    /// A fresh, collision-resistant call id.
    pub fn generate_id() -> String {
        format!("call_{}", Uuid::new_v4().simple())
    }

    /// Assign a generated id when the backend did not provide one.
    /// Returns `true` if an id was assigned.
    pub fn ensure_id(&mut self) -> bool {
        if self.id.trim().is_empty() {
            self.id = Self::generate_id();
            true
        } else {
            false
        }
    }

    /// Parse the arguments into a JSON object. Empty arguments mean `{}`.
    pub fn arguments_object(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        serde_json::from_str(&self.arguments)
    }
}

/// Render an argument value as the plain string a command line or a
/// document would show: strings verbatim, everything else as JSON.
pub fn argument_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single turn in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,

    /// The content (empty for assistant turns that only request tools)
    #[serde(default)]
    pub content: Content,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Reasoning text returned alongside an answer; never sent back as content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Provider-specific extras (citation annotations and the like)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Turn {
    fn with_role(role: Role, content: Content) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            reasoning: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Content::Text(content.into()))
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Content::Text(content.into()))
    }

    /// An assistant turn that carries tool-call requests instead of content.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, Content::default())
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, Content::Text(content.into()))
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Textual view of the content.
    pub fn text(&self) -> Cow<'_, str> {
        self.content.as_text()
    }

    /// Whether this is an assistant turn asking for tools to run.
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. Turns already in the session are never edited.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl Extend<Turn> for Session {
    fn extend<I: IntoIterator<Item = Turn>>(&mut self, iter: I) {
        self.turns.extend(iter);
    }
}

impl FromIterator<Turn> for Session {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Session {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("Hello, agent!");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text(), "Hello, agent!");
        assert!(turn.tool_calls.is_empty());
    }

    #[test]
    fn headers_map_both_ways() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(Role::from_header(role.header()), Some(role));
        }
        assert_eq!(Role::from_header("T"), None);
        assert_eq!(Role::from_header("X"), None);
    }

    #[test]
    fn single_text_part_collapses_to_plain_text() {
        let content = Content::from_parts(vec![ContentPart::text("foo")]);
        assert_eq!(content, Content::Text("foo".into()));

        let content = Content::from_parts(vec![
            ContentPart::text("look: "),
            ContentPart::Image {
                source: "https://a.com/1.png".into(),
                url: "https://a.com/1.png".into(),
                alt: None,
            },
        ]);
        assert!(matches!(content, Content::Parts(ref p) if p.len() == 2));
        assert_eq!(content.as_text(), "look: [img[https://a.com/1.png]]");
    }

    #[test]
    fn markdown_image_renders_back_as_markdown() {
        let part = ContentPart::Image {
            source: "cat.png".into(),
            url: "data:image/png;base64,AAAA".into(),
            alt: Some("a cat".into()),
        };
        assert_eq!(part.to_source_text(), "![a cat](cat.png)");
    }

    #[test]
    fn missing_tool_call_id_is_generated() {
        let mut call = ToolCall::new("", "search", &serde_json::json!({"q": "x"}));
        assert!(call.ensure_id());
        assert!(call.id.starts_with("call_"));

        let mut other = ToolCall::new("", "search", &serde_json::json!({}));
        other.ensure_id();
        assert_ne!(call.id, other.id);

        let mut kept = ToolCall::new("call_1", "search", &serde_json::json!({}));
        assert!(!kept.ensure_id());
        assert_eq!(kept.id, "call_1");
    }

    #[test]
    fn empty_arguments_parse_as_empty_object() {
        let call = ToolCall {
            id: "1".into(),
            name: "noop".into(),
            arguments: String::new(),
        };
        assert!(call.arguments_object().unwrap().is_empty());
    }

    #[test]
    fn non_string_arguments_are_stringified() {
        assert_eq!(argument_to_string(&serde_json::json!("berlin")), "berlin");
        assert_eq!(argument_to_string(&serde_json::json!(3)), "3");
        assert_eq!(argument_to_string(&serde_json::json!([1, 2])), "[1,2]");
    }

    #[test]
    fn session_is_append_only_and_ordered() {
        let mut session = Session::new();
        session.push(Turn::system("rules"));
        session.push(Turn::user("hi"));
        session.extend([Turn::assistant("hello")]);
        let roles: Vec<_> = session.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(session.last().unwrap().text(), "hello");
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::assistant_tool_calls(vec![ToolCall::new(
            "call_1",
            "search_web",
            &serde_json::json!({"query": "berlin"}),
        )]);
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert!(back.requests_tools());
        assert_eq!(back.tool_calls[0].name, "search_web");
    }
}
