//! Defect detection: the first oracle round trip.
//!
//! The oracle is asked for one `"<line>: <description>"` per defect. Lines
//! that don't fit are skipped with a reason.

use crate::config::RepairConfig;
use crate::grammar::{parse_index, Parsed, SkipReason};
use crate::oracle::{ChatMessage, Oracle, OracleRequest};
use std::fmt;
use tracing::{debug, warn};

/// Lines of an oracle reply starting with this marker are commentary.
pub const RESPONSE_COMMENT_MARKER: &str = "#";

/// A defect reported against a line of the original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub line: i64,
    pub message: String,
}

impl ErrorReport {
    pub fn new(line: i64, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

pub fn build_request(config: &RepairConfig, annotated: &str) -> OracleRequest {
    OracleRequest {
        model: config.oracle.model.clone(),
        temperature: config.oracle.temperature,
        messages: vec![
            ChatMessage::system(config.prompts.error_system.clone()),
            ChatMessage::user(format!(
                "{}\n\n{}",
                config.prompts.error_user_prefix, annotated
            )),
        ],
    }
}

/// Parse `"<int>: <text>"` lines.
pub fn parse_error_reports(response: &str) -> Parsed<ErrorReport> {
    let mut parsed = Parsed::default();

    for line in response.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            parsed.skip(SkipReason::Blank);
            continue;
        }
        if trimmed.starts_with(RESPONSE_COMMENT_MARKER) {
            parsed.skip(SkipReason::Comment);
            continue;
        }
        let Some((index, message)) = line.split_once(':') else {
            parsed.skip(SkipReason::MissingSeparator);
            continue;
        };
        match parse_index(index) {
            Some(index) => parsed.accept(ErrorReport::new(index, message.trim())),
            None => parsed.skip(SkipReason::NonIntegerIndex),
        }
    }

    parsed
}

/// Ask the oracle for defects in `annotated` source.
///
/// A failed call yields a sentinel report at line 1 describing the failure.
pub fn detect_defects(
    oracle: &dyn Oracle,
    config: &RepairConfig,
    annotated: &str,
) -> Parsed<ErrorReport> {
    let request = build_request(config, annotated);

    match oracle.complete(&request) {
        Ok(response) => {
            let parsed = parse_error_reports(&response);
            debug!(
                reports = parsed.items.len(),
                skipped = parsed.skipped(),
                "Parsed defect reports"
            );
            parsed
        }
        Err(err) => {
            let reason = format!("defect analysis failed: {err}");
            warn!(error = %err, "Defect oracle unavailable");
            Parsed::sentinel(ErrorReport::new(1, reason.clone()), reason)
        }
    }
}
