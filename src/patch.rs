//! Line-anchored patch engine.
//!
//! Applies an ordered list of [`EditOperation`]s to the original line buffer
//! in a single forward pass. Every operation targets a 1-based index in the
//! ORIGINAL buffer; positions in the growing output are never used.
//!
//! Rules, per original index `i`:
//!
//! - Only the first operation (in sequence order) targeting `i` fires; later
//!   ones are reported as shadowed.
//! - `Replace` emits the trimmed text indented to the original line's width.
//! - `InsertBefore` emits the indented text, then the most recently emitted
//!   original line again (the cursor), then original line `i`.
//! - `Unknown` emits the raw text with no indentation and no terminator, and
//!   does not mark the buffer modified.
//!
//! Indentation always comes from the original line. Annotated or compacted
//! oracle text never reaches this module.

use crate::source::{split_lines, SourceLine};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// How an operation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EditAction {
    /// Substitute the target line
    Replace,
    /// Insert a line before the target, replaying the previous original line
    InsertBefore,
    /// Unrecognised action keyword; the raw text is appended verbatim
    Unknown(String),
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditAction::Replace => write!(f, "replace"),
            EditAction::InsertBefore => write!(f, "insert-before"),
            EditAction::Unknown(token) => write!(f, "unknown({token:?})"),
        }
    }
}

/// One line-indexed edit as emitted by the fix oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOperation {
    /// 1-based index into the original buffer. Values outside `1..=N` never
    /// match a line.
    pub target: i64,
    pub action: EditAction,
    pub text: String,
}

impl EditOperation {
    pub fn new(target: i64, action: EditAction, text: impl Into<String>) -> Self {
        Self {
            target,
            action,
            text: text.into(),
        }
    }

    pub fn replace(target: i64, text: impl Into<String>) -> Self {
        Self::new(target, EditAction::Replace, text)
    }

    pub fn insert_before(target: i64, text: impl Into<String>) -> Self {
        Self::new(target, EditAction::InsertBefore, text)
    }
}

/// An operation that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    pub target: usize,
    pub action: EditAction,
}

/// Output of [`apply_operations`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[must_use = "PatchResult carries the new buffer and the modified flag"]
pub struct PatchResult {
    pub lines: Vec<String>,
    pub modified: bool,
    /// Operations that fired, in original line order
    pub applied: Vec<AppliedEdit>,
    /// In-range operations ignored because an earlier one had the same target
    pub shadowed: Vec<EditOperation>,
    /// Operations whose target is outside `1..=N`
    pub unmatched: Vec<EditOperation>,
}

impl PatchResult {
    /// The new buffer as one string.
    pub fn content(&self) -> String {
        self.lines.concat()
    }
}

/// Apply `operations` to `lines`.
pub fn apply_operations(lines: &[SourceLine], operations: &[EditOperation]) -> PatchResult {
    let line_count = lines.len() as i64;

    // First operation per target wins.
    let mut first_for_target: HashMap<i64, usize> = HashMap::new();
    let mut result = PatchResult {
        lines: Vec::with_capacity(lines.len()),
        ..PatchResult::default()
    };

    for (pos, op) in operations.iter().enumerate() {
        if op.target < 1 || op.target > line_count {
            result.unmatched.push(op.clone());
            continue;
        }
        if first_for_target.contains_key(&op.target) {
            result.shadowed.push(op.clone());
        } else {
            first_for_target.insert(op.target, pos);
        }
    }

    let mut cursor: Option<&str> = None;

    for (offset, line) in lines.iter().enumerate() {
        let index = offset + 1;
        let Some(&pos) = first_for_target.get(&(index as i64)) else {
            result.lines.push(line.text.clone());
            cursor = Some(&line.text);
            continue;
        };

        let op = &operations[pos];
        trace!(line = index, action = %op.action, "Applying edit");

        match &op.action {
            EditAction::Replace => {
                result.lines.push(indented(line, op.text.trim()));
                result.modified = true;
            }
            EditAction::InsertBefore => {
                result.lines.push(indented(line, &op.text));
                if let Some(previous) = cursor {
                    result.lines.push(previous.to_string());
                }
                result.lines.push(line.text.clone());
                result.modified = true;
            }
            EditAction::Unknown(_) => {
                result.lines.push(op.text.clone());
                cursor = Some(&line.text);
            }
        }

        result.applied.push(AppliedEdit {
            target: index,
            action: op.action.clone(),
        });
    }

    debug!(
        input_lines = lines.len(),
        output_lines = result.lines.len(),
        applied = result.applied.len(),
        shadowed = result.shadowed.len(),
        unmatched = result.unmatched.len(),
        modified = result.modified,
        "Patch pass complete"
    );

    result
}

/// Apply operations to raw text.
pub fn apply_to_text(content: &str, operations: &[EditOperation]) -> PatchResult {
    apply_operations(&split_lines(content), operations)
}

/// `text` indented to `original`'s width and terminated like `original`.
fn indented(original: &SourceLine, text: &str) -> String {
    let terminator = match original.terminator() {
        "" => "\n",
        t => t,
    };
    let width = original.indent_width();
    let mut out = String::with_capacity(width + text.len() + terminator.len());
    out.extend(std::iter::repeat(' ').take(width));
    out.push_str(text);
    out.push_str(terminator);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SourceLine> {
        split_lines("def f():\n  return 1\n  return 2\n")
    }

    #[test]
    fn test_no_operations_is_identity() {
        let lines = sample();
        let result = apply_operations(&lines, &[]);
        assert!(!result.modified);
        assert_eq!(result.content(), "def f():\n  return 1\n  return 2\n");
        assert!(result.applied.is_empty());
    }

    #[test]
    fn test_replace_keeps_original_indentation() {
        let result = apply_operations(&sample(), &[EditOperation::replace(2, "return 10")]);
        assert!(result.modified);
        assert_eq!(
            result.lines,
            vec!["def f():\n", "  return 10\n", "  return 2\n"]
        );
    }

    #[test]
    fn test_replace_ignores_replacement_whitespace() {
        let result =
            apply_operations(&sample(), &[EditOperation::replace(2, "        return 10   ")]);
        assert_eq!(result.lines[1], "  return 10\n");
    }

    #[test]
    fn test_insert_before_replays_previous_line() {
        let result = apply_operations(&sample(), &[EditOperation::insert_before(2, "x = 0")]);
        assert!(result.modified);
        assert_eq!(
            result.lines,
            vec![
                "def f():\n",
                "  x = 0\n",
                "def f():\n",
                "  return 1\n",
                "  return 2\n"
            ]
        );
    }

    #[test]
    fn test_insert_before_first_line_has_nothing_to_replay() {
        let result = apply_operations(&sample(), &[EditOperation::insert_before(1, "import os")]);
        assert_eq!(
            result.lines,
            vec!["import os\n", "def f():\n", "  return 1\n", "  return 2\n"]
        );
    }

    #[test]
    fn test_first_match_wins() {
        let ops = vec![
            EditOperation::replace(2, "return 10"),
            EditOperation::replace(2, "return 20"),
        ];
        let result = apply_operations(&sample(), &ops);
        assert_eq!(result.lines[1], "  return 10\n");
        assert_eq!(result.shadowed, vec![EditOperation::replace(2, "return 20")]);
        assert_eq!(result.applied.len(), 1);
    }

    #[test]
    fn test_operations_are_anchored_to_original_indices() {
        // The insert at 2 grows the output, yet the replace still hits original line 3.
        let ops = vec![
            EditOperation::replace(3, "return 30"),
            EditOperation::insert_before(2, "x = 0"),
        ];
        let result = apply_operations(&sample(), &ops);
        assert_eq!(result.lines.last().unwrap(), "  return 30\n");
        assert_eq!(result.applied[0].target, 2);
        assert_eq!(result.applied[1].target, 3);
    }

    #[test]
    fn test_unknown_appends_raw_text_without_modifying() {
        let ops = vec![EditOperation::new(
            2,
            EditAction::Unknown("удалить".to_string()),
            "pass",
        )];
        let result = apply_operations(&sample(), &ops);
        assert!(!result.modified);
        assert_eq!(result.lines, vec!["def f():\n", "pass", "  return 2\n"]);
    }

    #[test]
    fn test_cursor_follows_unknown_but_not_replace() {
        let ops = vec![
            EditOperation::new(1, EditAction::Unknown(String::new()), "raw"),
            EditOperation::replace(2, "return 10"),
            EditOperation::insert_before(3, "y = 1"),
        ];
        let result = apply_operations(&sample(), &ops);
        assert_eq!(
            result.lines,
            vec![
                "raw",
                "  return 10\n",
                "  y = 1\n",
                // cursor still holds original line 1
                "def f():\n",
                "  return 2\n"
            ]
        );
    }

    #[test]
    fn test_out_of_range_targets_are_dropped() {
        let ops = vec![
            EditOperation::replace(0, "zero"),
            EditOperation::replace(-1, "negative"),
            EditOperation::replace(4, "past end"),
        ];
        let result = apply_operations(&sample(), &ops);
        assert!(!result.modified);
        assert_eq!(result.unmatched.len(), 3);
        assert_eq!(result.content(), "def f():\n  return 1\n  return 2\n");
    }

    #[test]
    fn test_replace_last_line_without_terminator_adds_newline() {
        let lines = split_lines("a = 1\n  b = 2");
        let result = apply_operations(&lines, &[EditOperation::replace(2, "b = 3")]);
        assert_eq!(result.lines[1], "  b = 3\n");
    }

    #[test]
    fn test_replace_keeps_crlf_terminator() {
        let lines = split_lines("a = 1\r\n    b = 2\r\n");
        let result = apply_operations(&lines, &[EditOperation::replace(2, "b = 3")]);
        assert_eq!(result.lines[1], "    b = 3\r\n");
    }

    #[test]
    fn test_tabs_become_spaces() {
        let lines = split_lines("if x:\n\tpass\n");
        let result = apply_operations(&lines, &[EditOperation::replace(2, "return")]);
        assert_eq!(result.lines[1], " return\n");
    }

    #[test]
    fn test_empty_buffer() {
        let result = apply_operations(&[], &[EditOperation::replace(1, "x")]);
        assert!(result.lines.is_empty());
        assert!(!result.modified);
        assert_eq!(result.unmatched.len(), 1);
    }

    #[test]
    fn test_apply_to_text() {
        let result = apply_to_text("x = 1\n", &[EditOperation::replace(1, "x = 2")]);
        assert_eq!(result.content(), "x = 2\n");
    }
}
