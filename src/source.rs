//! Line buffers read from disk.
//!
//! A [`SourceFile`] is loaded once per run. Every line keeps its original
//! terminator so that untouched lines round-trip byte-for-byte.

use std::fs;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// One line of the original file, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the original file
    pub index: usize,
    /// Line text including `"\n"` or `"\r\n"` when present
    pub text: String,
}

impl SourceLine {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// The line terminator, or `""` for a final line without one.
    pub fn terminator(&self) -> &str {
        terminator_of(&self.text)
    }

    /// Line content without its terminator.
    pub fn body(&self) -> &str {
        &self.text[..self.text.len() - self.terminator().len()]
    }

    /// Number of whitespace characters before the first non-whitespace one.
    ///
    /// The terminator is never counted, so a blank line has width equal to
    /// the spaces and tabs it holds.
    pub fn indent_width(&self) -> usize {
        indent_width(&self.text)
    }
}

/// Leading-whitespace width of a raw line, terminator excluded.
pub fn indent_width(line: &str) -> usize {
    let body = &line[..line.len() - terminator_of(line).len()];
    body.chars().take_while(|c| c.is_whitespace()).count()
}

fn terminator_of(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// Split text into lines, keeping each line's terminator.
pub fn split_lines(content: &str) -> Vec<SourceLine> {
    content
        .split_inclusive('\n')
        .enumerate()
        .map(|(i, text)| SourceLine::new(i + 1, text))
        .collect()
}

/// A file loaded into memory together with a fingerprint of its bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub lines: Vec<SourceLine>,
    /// xxh3 hash of the content as read
    pub fingerprint: u64,
}

impl SourceFile {
    /// Read a UTF-8 file from disk.
    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Ok(Self::from_content(path, &content))
    }

    /// Build from in-memory content (the path is kept for reporting only).
    pub fn from_content(path: impl Into<PathBuf>, content: &str) -> Self {
        Self {
            path: path.into(),
            lines: split_lines(content),
            fingerprint: fingerprint(content.as_bytes()),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Reassemble the original content.
    pub fn content(&self) -> String {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }
}

pub fn fingerprint(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}
