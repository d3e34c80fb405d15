//! Envelope handling: the text around `__START__` / `__END__` sentinel lines.
//!
//! Only the main region takes part in the conversation. Whatever sits
//! before the last start sentinel or after the first end sentinel is
//! carried through untouched.

use regex::Regex;
use std::sync::LazyLock;

pub const START_SENTINEL: &str = "__START__";
pub const END_SENTINEL: &str = "__END__";

static START_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^__START__\s*\n").expect("start marker regex is valid"));

static END_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^__END__\s*\n").expect("end marker regex is valid"));

/// A document split into its conversation region and the opaque text around it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub leading: Option<String>,
    pub main: String,
    pub trailing: Option<String>,
}

/// Split a document on its sentinel lines.
///
/// The last start sentinel and the first end sentinel win, so repeated
/// sentinels collapse into `leading` and `trailing` respectively.
pub fn split(document: &str) -> Envelope {
    let mut leading_chunks: Vec<&str> = START_MARKER.split(document).collect();
    let tail = leading_chunks.pop().unwrap_or_default();

    let mut trailing_chunks = END_MARKER.split(tail);
    let main = trailing_chunks.next().unwrap_or_default().to_string();
    let rest: Vec<&str> = trailing_chunks.collect();

    let leading = (!leading_chunks.is_empty()).then(|| leading_chunks.join("__START__\n"));
    let trailing = (!rest.is_empty()).then(|| rest.join("__END__\n"));

    Envelope {
        leading,
        main,
        trailing,
    }
}

/// Put `content` back between the preserved leading and trailing text.
///
/// A present but empty segment still gets its sentinel, so the output
/// keeps the same envelope shape on the next run.
pub fn rebuild(leading: Option<&str>, content: &str, trailing: Option<&str>) -> String {
    let mut out = String::with_capacity(
        content.len() + leading.map_or(0, str::len) + trailing.map_or(0, str::len) + 24,
    );
    if let Some(leading) = leading {
        out.push_str(leading);
        out.push_str(START_SENTINEL);
        out.push_str("\n\n");
    }
    out.push_str(content);
    if let Some(trailing) = trailing {
        out.push('\n');
        out.push_str(END_SENTINEL);
        out.push('\n');
        out.push_str(trailing);
    }
    out
}

impl Envelope {
    /// Rebuild the document around new main content.
    pub fn rebuild(&self, content: &str) -> String {
        rebuild(self.leading.as_deref(), content, self.trailing.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sentinels_keeps_whole_document() {
        let env = split("foo");
        assert_eq!(
            env,
            Envelope {
                leading: None,
                main: "foo".into(),
                trailing: None
            }
        );
        assert_eq!(env.rebuild(&env.main), "foo");
    }

    #[test]
    fn round_trip_without_sentinels() {
        for doc in ["", "a\nb\n", "Q>>\n\nhello\n\nA>>\n\nhi\n", "  __START__ not at line start\n"] {
            let env = split(doc);
            assert!(env.leading.is_none());
            assert!(env.trailing.is_none());
            assert_eq!(env.rebuild(&env.main), doc);
        }
    }

    #[test]
    fn splits_leading_main_and_trailing() {
        let env = split("AAAA\n__START__\nBBBB\n__END__\nCCCC");
        assert_eq!(env.leading.as_deref(), Some("AAAA\n"));
        assert_eq!(env.main, "BBBB\n");
        assert_eq!(env.trailing.as_deref(), Some("CCCC"));
    }

    #[test]
    fn last_start_sentinel_wins() {
        let env = split("AAAA\n__START__\nBBBB\n__START__\nCCCC");
        assert_eq!(env.leading.as_deref(), Some("AAAA\n__START__\nBBBB\n"));
        assert_eq!(env.main, "CCCC");
        assert!(env.trailing.is_none());
    }

    #[test]
    fn first_end_sentinel_wins() {
        let env = split("AAAA\nBBBB\n__END__\nCCCC\n__END__\nDDDD");
        assert!(env.leading.is_none());
        assert_eq!(env.main, "AAAA\nBBBB\n");
        assert_eq!(env.trailing.as_deref(), Some("CCCC\n__END__\nDDDD"));
    }

    #[test]
    fn rebuild_restores_envelope_around_new_content() {
        let env = split("notes\n__START__\nQ>>\n\nhi\n__END__\nfooter");
        let out = env.rebuild("NEW");
        assert_eq!(out, "notes\n__START__\n\nNEW\n__END__\nfooter");
        let again = split(&out);
        assert_eq!(again.leading, env.leading);
        assert_eq!(again.trailing, env.trailing);
    }

    #[test]
    fn empty_leading_keeps_its_sentinel() {
        let env = split("__START__\nbody");
        assert_eq!(env.leading.as_deref(), Some(""));
        assert_eq!(env.rebuild("x"), "__START__\n\nx");
    }
}
