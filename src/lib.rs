//! linefix: oracle-driven line repair for source files
//!
//! A file is sent to a language-model oracle twice: once to list defects as
//! `"<line>: <message>"`, once to get line-indexed fix instructions as
//! `"<line>, <action>, <text>"`. The instructions are then applied
//! mechanically to the original line buffer.
//!
//! # Architecture
//!
//! The interesting part is [`patch::apply_operations`]: a single forward pass
//! that reconciles a sparse, possibly duplicated, order-sensitive list of
//! [`EditOperation`]s against the original lines. Everything around it is
//! request/response glue:
//!
//! - [`annotate`] renders line-numbered text for the oracle
//! - [`report`] and [`fix`] build requests and parse replies leniently
//! - [`writer`] replaces the file atomically, only when modified
//! - [`pipeline`] runs the stages in order
//!
//! # Example
//!
//! ```
//! use linefix::{apply_operations, split_lines, EditOperation};
//!
//! let lines = split_lines("def f():\n  return 1\n  return 2\n");
//! let result = apply_operations(&lines, &[EditOperation::replace(2, "return 10")]);
//!
//! assert!(result.modified);
//! assert_eq!(result.content(), "def f():\n  return 10\n  return 2\n");
//! ```

pub mod annotate;
pub mod config;
pub mod fix;
pub mod grammar;
pub mod oracle;
pub mod patch;
pub mod pipeline;
pub mod report;
pub mod safety;
pub mod source;
pub mod writer;

// Re-exports
pub use annotate::{annotate, AnnotateMode, Annotator};
pub use config::{load_from_path, load_from_str, ConfigError, RepairConfig};
pub use fix::{parse_fix_response, request_fixes, ActionKeywords};
pub use grammar::{LineVerdict, Parsed, SkipReason};
pub use oracle::{ChatMessage, HttpOracle, Oracle, OracleError, OracleRequest, ReplayOracle, Role};
pub use patch::{apply_operations, apply_to_text, AppliedEdit, EditAction, EditOperation, PatchResult};
pub use pipeline::{patch_from_response, Pipeline, PipelineError, RepairOutcome, RepairReport, Stage};
pub use report::{detect_defects, parse_error_reports, ErrorReport};
pub use safety::{SafetyError, WorkspaceGuard};
pub use source::{split_lines, SourceFile, SourceLine};
pub use writer::{write_if_modified, WriteError, WriteOutcome};
