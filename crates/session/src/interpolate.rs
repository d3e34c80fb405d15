//! Inline reference expansion for user turns.
//!
//! Two syntaxes are recognised, in document order:
//! - tags `[type[payload]]` for the registered types `txt`, `img` and `audio`
//! - markdown images `![alt](src)`
//!
//! Everything else stays text. Unknown tag types are left as written.

use base64::Engine as _;
use regex::Regex;
use scribe_core::{AudioFormat, ContentError, ContentPart};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\w+)\[([^\]]+)\]\]").expect("tag regex is valid"));

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").expect("markdown image regex is valid")
});

/// What the interpolator needs to know about its caller.
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    /// Audio encoding expected by the backend the turn will be sent to
    pub audio_format: AudioFormat,
    /// Directory relative references are resolved against (cwd when unset)
    pub base_dir: Option<PathBuf>,
}

impl InterpolationContext {
    pub fn new(audio_format: AudioFormat) -> Self {
        Self {
            audio_format,
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) if Path::new(reference).is_relative() => base.join(reference),
            _ => PathBuf::from(reference),
        }
    }
}

enum Reference<'a> {
    Tag { kind: &'a str, payload: &'a str },
    Markdown { alt: &'a str, src: &'a str },
}

/// Expand the references in `text` into ordered content parts.
///
/// Text around references becomes text parts; whitespace-only text is
/// dropped because some backends reject empty text blocks.
pub fn interpolate(text: &str, ctx: &InterpolationContext) -> Result<Vec<ContentPart>, ContentError> {
    let mut matches: Vec<(usize, usize, Reference<'_>)> = Vec::new();
    for caps in TAG.captures_iter(text) {
        if let (Some(whole), Some(kind), Some(payload)) = (caps.get(0), caps.get(1), caps.get(2)) {
            matches.push((
                whole.start(),
                whole.end(),
                Reference::Tag {
                    kind: kind.as_str(),
                    payload: payload.as_str(),
                },
            ));
        }
    }
    for caps in MARKDOWN_IMAGE.captures_iter(text) {
        if let (Some(whole), Some(alt), Some(src)) = (caps.get(0), caps.get(1), caps.get(2)) {
            matches.push((
                whole.start(),
                whole.end(),
                Reference::Markdown {
                    alt: alt.as_str(),
                    src: src.as_str(),
                },
            ));
        }
    }
    matches.sort_by_key(|(start, _, _)| *start);

    let mut parts = Vec::new();
    let mut pending = String::new();
    let mut cursor = 0;

    for (start, end, reference) in matches {
        if start < cursor {
            // overlaps a reference already expanded
            continue;
        }
        pending.push_str(&text[cursor..start]);
        cursor = end;

        let part = match reference {
            Reference::Markdown { alt, src } => Some(load_image(src, Some(alt), ctx)?),
            Reference::Tag { kind, payload } => match kind {
                "txt" => Some(load_text(payload, ctx)?),
                "img" => Some(load_image(payload, None, ctx)?),
                "audio" => Some(load_audio(payload, ctx)?),
                _ => None,
            },
        };

        match part {
            Some(part) => {
                flush_text(&mut pending, &mut parts);
                parts.push(part);
            }
            None => pending.push_str(&text[start..end]),
        }
    }

    pending.push_str(&text[cursor..]);
    flush_text(&mut pending, &mut parts);
    Ok(parts)
}

fn flush_text(pending: &mut String, parts: &mut Vec<ContentPart>) {
    if pending.trim().is_empty() {
        pending.clear();
    } else {
        parts.push(ContentPart::text(std::mem::take(pending)));
    }
}

fn is_remote(reference: &str) -> bool {
    url::Url::parse(reference).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn read_bytes(reference: &str, ctx: &InterpolationContext) -> Result<Vec<u8>, ContentError> {
    let path = ctx.resolve(reference);
    std::fs::read(&path).map_err(|e| ContentError::Load {
        path,
        reason: e.to_string(),
    })
}

fn extension_of(reference: &str) -> String {
    Path::new(reference)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn load_text(reference: &str, ctx: &InterpolationContext) -> Result<ContentPart, ContentError> {
    let path = ctx.resolve(reference);
    let text = std::fs::read_to_string(&path).map_err(|e| ContentError::Load {
        path,
        reason: e.to_string(),
    })?;
    tracing::debug!(path = reference, bytes = text.len(), "Inlined text file");
    Ok(ContentPart::File {
        path: reference.to_string(),
        text,
    })
}

fn load_image(
    reference: &str,
    alt: Option<&str>,
    ctx: &InterpolationContext,
) -> Result<ContentPart, ContentError> {
    let url = if is_remote(reference) || reference.starts_with("data:") {
        reference.to_string()
    } else {
        let bytes = read_bytes(reference, ctx)?;
        let mime = mime_guess::from_path(reference)
            .first()
            .filter(|m| m.type_() == mime_guess::mime::IMAGE)
            .map(|m| m.essence_str().to_owned())
            .unwrap_or_else(|| "image/png".to_string());
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        tracing::debug!(path = reference, %mime, "Inlined image");
        format!("data:{mime};base64,{encoded}")
    };
    Ok(ContentPart::Image {
        source: reference.to_string(),
        url,
        alt: alt.map(str::to_string),
    })
}

fn load_audio(reference: &str, ctx: &InterpolationContext) -> Result<ContentPart, ContentError> {
    if is_remote(reference) {
        return Err(ContentError::UnsupportedReference {
            kind: "audio".into(),
            reference: reference.to_string(),
        });
    }
    let bytes = read_bytes(reference, ctx)?;
    let extension = extension_of(reference);
    let mime_type = mime_guess::from_ext(&extension)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::AUDIO)
        .map(|m| m.essence_str().to_owned())
        .unwrap_or_else(|| format!("audio/{extension}"));
    Ok(ContentPart::Audio {
        path: reference.to_string(),
        mime_type,
        extension,
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
        format: ctx.audio_format,
    })
}
