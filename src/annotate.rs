//! Oracle-facing rendering of a line buffer.
//!
//! Annotated text is only ever sent to the oracle. Nothing rendered here is
//! read back when computing indentation or rebuilding the file.

use crate::source::SourceLine;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// How lines are rendered after their `"<index>: "` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotateMode {
    /// Line text verbatim, terminator included
    #[default]
    Verbatim,
    /// Comment suffix removed and whitespace runs collapsed
    Compact,
}

#[derive(Debug, Clone)]
pub struct Annotator {
    mode: AnnotateMode,
    comment_marker: String,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(AnnotateMode::Verbatim, "#")
    }
}

impl Annotator {
    pub fn new(mode: AnnotateMode, comment_marker: impl Into<String>) -> Self {
        Self {
            mode,
            comment_marker: comment_marker.into(),
        }
    }

    pub fn mode(&self) -> AnnotateMode {
        self.mode
    }

    /// Render every line as `"<index>: <text>"`.
    pub fn annotate(&self, lines: &[SourceLine]) -> String {
        let mut out = String::new();
        for line in lines {
            out.push_str(&line.index.to_string());
            out.push_str(": ");
            match self.mode {
                AnnotateMode::Verbatim => out.push_str(&line.text),
                AnnotateMode::Compact => {
                    out.push_str(&self.compact_line(line.body()));
                    out.push('\n');
                }
            }
        }
        out
    }

    fn compact_line(&self, body: &str) -> String {
        // Naive: a marker inside a string literal also starts a "comment".
        let code = match body.find(self.comment_marker.as_str()) {
            Some(pos) if !self.comment_marker.is_empty() => &body[..pos],
            _ => body,
        };
        WHITESPACE_RUN.replace_all(code, " ").trim_end().to_string()
    }
}

/// Plain line-numbered rendering.
pub fn annotate(lines: &[SourceLine]) -> String {
    Annotator::default().annotate(lines)
}
