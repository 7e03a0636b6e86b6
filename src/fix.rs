//! Fix suggestions: the second oracle round trip.
//!
//! The oracle sees the annotated source and the rendered defect list, and
//! answers with one `"<line>, <action>, <text>"` per edit. Anything else is
//! skipped, never raised.

use crate::config::RepairConfig;
use crate::grammar::{parse_index, Parsed, SkipReason};
use crate::oracle::{ChatMessage, Oracle, OracleRequest};
use crate::patch::{EditAction, EditOperation};
use crate::report::ErrorReport;
use tracing::{debug, warn};

/// The two recognised action keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionKeywords {
    pub replace: String,
    pub insert_before: String,
}

impl Default for ActionKeywords {
    fn default() -> Self {
        Self {
            replace: "заменить".to_string(),
            insert_before: "добавить".to_string(),
        }
    }
}

impl ActionKeywords {
    /// Map a trimmed action token to its action. Anything unrecognised is
    /// kept as [`EditAction::Unknown`].
    pub fn classify(&self, token: &str) -> EditAction {
        let token = token.trim();
        if token == self.replace {
            EditAction::Replace
        } else if token == self.insert_before {
            EditAction::InsertBefore
        } else {
            EditAction::Unknown(token.to_string())
        }
    }
}

/// Render defects as `"<prefix> <n>: <message>"`, one per line.
pub fn render_defects(reports: &[ErrorReport], prefix: &str) -> String {
    reports
        .iter()
        .map(|r| format!("{} {}: {}", prefix, r.line, r.message))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_request(
    config: &RepairConfig,
    annotated: &str,
    reports: &[ErrorReport],
) -> OracleRequest {
    let defects = render_defects(reports, &config.prompts.defect_line_prefix);
    OracleRequest {
        model: config.oracle.model.clone(),
        temperature: config.oracle.temperature,
        messages: vec![
            ChatMessage::system(config.fix_system_prompt()),
            ChatMessage::user(format!(
                "{}\n\n{}\n\n{}\n{}",
                config.prompts.fix_user_prefix,
                annotated,
                config.prompts.fix_errors_header,
                defects
            )),
        ],
    }
}

/// Parse `"<int>, <action>, <text>"` lines.
///
/// Each line is split on `,` into at most three fields, so the text may
/// itself contain commas.
pub fn parse_fix_response(response: &str, keywords: &ActionKeywords) -> Parsed<EditOperation> {
    let mut parsed = Parsed::default();

    for line in response.split('\n') {
        if line.trim().is_empty() {
            parsed.skip(SkipReason::Blank);
            continue;
        }

        let fields: Vec<&str> = line.splitn(3, ',').collect();
        let [index, action, text] = fields.as_slice() else {
            parsed.skip(if fields.len() == 1 {
                SkipReason::MissingSeparator
            } else {
                SkipReason::WrongFieldCount {
                    found: fields.len(),
                }
            });
            continue;
        };

        match parse_index(index) {
            Some(target) => parsed.accept(EditOperation::new(
                target,
                keywords.classify(action),
                text.trim(),
            )),
            None => parsed.skip(SkipReason::NonIntegerIndex),
        }
    }

    parsed
}

/// Ask the oracle how to fix `reports`.
///
/// A failed call yields the sentinel operation `(1, Unknown, <failure>)`.
pub fn request_fixes(
    oracle: &dyn Oracle,
    config: &RepairConfig,
    annotated: &str,
    reports: &[ErrorReport],
) -> Parsed<EditOperation> {
    let request = build_request(config, annotated, reports);

    match oracle.complete(&request) {
        Ok(response) => {
            let parsed = parse_fix_response(&response, &config.action_keywords());
            debug!(
                operations = parsed.items.len(),
                skipped = parsed.skipped(),
                "Parsed fix operations"
            );
            parsed
        }
        Err(err) => {
            let reason = format!("fix suggestion failed: {err}");
            warn!(error = %err, "Fix oracle unavailable");
            Parsed::sentinel(
                EditOperation::new(1, EditAction::Unknown(String::new()), reason.clone()),
                reason,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ReplayOracle;

    #[test]
    fn test_classify_keywords() {
        let keywords = ActionKeywords::default();
        assert_eq!(keywords.classify(" заменить "), EditAction::Replace);
        assert_eq!(keywords.classify("добавить"), EditAction::InsertBefore);
        assert_eq!(
            keywords.classify("удалить"),
            EditAction::Unknown("удалить".to_string())
        );
    }

    #[test]
    fn test_parse_fix_lines() {
        let response = "2, заменить, return 10\n5, добавить, import os";
        let parsed = parse_fix_response(response, &ActionKeywords::default());
        assert_eq!(
            parsed.items,
            vec![
                EditOperation::replace(2, "return 10"),
                EditOperation::insert_before(5, "import os"),
            ]
        );
    }

    #[test]
    fn test_text_may_contain_commas() {
        let parsed = parse_fix_response("3, заменить, f(a, b, c)", &ActionKeywords::default());
        assert_eq!(parsed.items, vec![EditOperation::replace(3, "f(a, b, c)")]);
    }

    #[test]
    fn test_unknown_action_is_kept() {
        let parsed = parse_fix_response("4, удалить, pass", &ActionKeywords::default());
        assert_eq!(
            parsed.items,
            vec![EditOperation::new(
                4,
                EditAction::Unknown("удалить".to_string()),
                "pass"
            )]
        );
    }

    #[test]
    fn test_malformed_lines_contribute_nothing() {
        let response = "\nno commas at all\n2, заменить\nx, заменить, y\n";
        let parsed = parse_fix_response(response, &ActionKeywords::default());

        assert!(parsed.items.is_empty());
        let counts = parsed.skip_counts();
        assert_eq!(counts[&SkipReason::Blank], 2);
        assert_eq!(counts[&SkipReason::MissingSeparator], 1);
        assert_eq!(counts[&SkipReason::WrongFieldCount { found: 2 }], 1);
        assert_eq!(counts[&SkipReason::NonIntegerIndex], 1);
    }

    #[test]
    fn test_preserves_emission_order_and_duplicates() {
        let response = "5, заменить, b\n2, заменить, a\n5, заменить, c";
        let parsed = parse_fix_response(response, &ActionKeywords::default());
        let targets: Vec<i64> = parsed.items.iter().map(|op| op.target).collect();
        assert_eq!(targets, vec![5, 2, 5]);
    }

    #[test]
    fn test_render_defects() {
        let reports = vec![ErrorReport::new(2, "bad"), ErrorReport::new(9, "worse")];
        assert_eq!(
            render_defects(&reports, "Строка"),
            "Строка 2: bad\nСтрока 9: worse"
        );
    }

    #[test]
    fn test_request_includes_defects() {
        let config = RepairConfig::default();
        let request = build_request(&config, "1: x\n", &[ErrorReport::new(1, "oops")]);
        let user = &request.messages[1].content;
        assert!(user.contains("1: x\n"));
        assert!(user.ends_with("Строка 1: oops"));
        assert!(request.messages[0].content.contains("заменить"));
    }

    #[test]
    fn test_request_fixes_transport_failure_yields_sentinel() {
        let oracle = ReplayOracle::with_results([Err("401 unauthorized".to_string())]);
        let parsed = request_fixes(&oracle, &RepairConfig::default(), "1: x\n", &[]);

        assert!(parsed.is_sentinel());
        let op = &parsed.items[0];
        assert_eq!(op.target, 1);
        assert_eq!(op.action, EditAction::Unknown(String::new()));
        assert!(op.text.contains("401 unauthorized"));
    }

    #[test]
    fn test_request_fixes_uses_configured_keywords() {
        let mut config = RepairConfig::default();
        config.actions.replace = "replace".to_string();
        config.actions.insert_before = "insert".to_string();
        let oracle = ReplayOracle::new(["1, replace, y = 2\n1, заменить, z"]);

        let parsed = request_fixes(&oracle, &config, "1: y = 1\n", &[]);
        assert_eq!(parsed.items[0].action, EditAction::Replace);
        assert_eq!(
            parsed.items[1].action,
            EditAction::Unknown("заменить".to_string())
        );
    }
}
