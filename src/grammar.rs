//! Per-line outcome of parsing free-form oracle text.
//!
//! Oracle replies are parsed leniently: a line either yields an item or is
//! skipped with a reason. Skips are tallied for diagnostics and never turn
//! into errors.

use std::collections::BTreeMap;
use std::fmt;

/// Why a response line produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    /// Empty or whitespace-only line
    Blank,
    /// Line starts with the comment marker
    Comment,
    /// The field separator does not occur at all
    MissingSeparator,
    /// Separator present but the field count is wrong
    WrongFieldCount { found: usize },
    /// The index field is not an integer
    NonIntegerIndex,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Blank => write!(f, "blank line"),
            SkipReason::Comment => write!(f, "comment line"),
            SkipReason::MissingSeparator => write!(f, "missing separator"),
            SkipReason::WrongFieldCount { found } => {
                write!(f, "wrong field count ({found})")
            }
            SkipReason::NonIntegerIndex => write!(f, "non-integer line index"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    Accepted,
    Skipped(SkipReason),
}

/// Items accepted from a response, plus one verdict per response line.
///
/// When the oracle call itself failed, `items` holds a single sentinel and
/// `failure` the transport error description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    pub verdicts: Vec<LineVerdict>,
    pub failure: Option<String>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            verdicts: Vec::new(),
            failure: None,
        }
    }
}

impl<T> Parsed<T> {
    pub(crate) fn accept(&mut self, item: T) {
        self.items.push(item);
        self.verdicts.push(LineVerdict::Accepted);
    }

    pub(crate) fn skip(&mut self, reason: SkipReason) {
        self.verdicts.push(LineVerdict::Skipped(reason));
    }

    /// A single synthetic item standing in for a failed oracle call.
    pub fn sentinel(item: T, failure: impl Into<String>) -> Self {
        Self {
            items: vec![item],
            verdicts: Vec::new(),
            failure: Some(failure.into()),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.failure.is_some()
    }

    pub fn skipped(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| matches!(v, LineVerdict::Skipped(_)))
            .count()
    }

    /// Number of skipped lines per reason.
    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for verdict in &self.verdicts {
            if let LineVerdict::Skipped(reason) = verdict {
                *counts.entry(*reason).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Parse a line-index field the way the wire grammar allows: surrounding
/// whitespace is ignored and a sign is accepted.
pub(crate) fn parse_index(field: &str) -> Option<i64> {
    field.trim().parse::<i64>().ok()
}
