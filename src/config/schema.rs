use crate::annotate::{AnnotateMode, Annotator};
use crate::fix::ActionKeywords;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_API_KEY_ENV: &str = "TOKEN_LLM";

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RepairConfig {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
    #[serde(default)]
    pub actions: ActionConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Instructions sent to the oracle.
///
/// `fix_system` may contain `{replace}` and `{insert_before}`, which are
/// substituted with the configured action keywords.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    pub error_system: String,
    pub error_user_prefix: String,
    pub fix_system: String,
    pub fix_user_prefix: String,
    pub fix_errors_header: String,
    pub defect_line_prefix: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            error_system: "Ты эксперт по Python. Проанализируй следующий код на наличие \
                синтаксических и логических ошибок. Код содержит номера строк в начале \
                каждой строки (например, '1: print(\"hello\")'). Возвращай только список \
                ошибок в формате: номер_строки: описание_ошибки. Важно: сохраняй \
                оригинальные отступы при анализе и исправлении."
                .to_string(),
            error_user_prefix: "Проанализируй этот Python код на ошибки:".to_string(),
            fix_system: "Ты эксперт по Python. Проанализируй код и предложи точные \
                исправления для каждой ошибки. Код содержит номера строк в начале каждой \
                строки (например, '1: print(\"hello\")'). Важно: при формировании \
                исправленного кода сохраняй оригинальные отступы и структуру кода. \
                ВОЗВРАЩАЙ только исправленный код, каждый набор с новой строки, в формате: \
                номер_строки, действие ({replace}, {insert_before}), исправленная_строка"
                .to_string(),
            fix_user_prefix: "Исправь следующий Python код:".to_string(),
            fix_errors_header: "Ошибки:".to_string(),
            defect_line_prefix: "Строка".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ActionConfig {
    pub replace: String,
    pub insert_before: String,
}

impl Default for ActionConfig {
    fn default() -> Self {
        let keywords = ActionKeywords::default();
        Self {
            replace: keywords.replace,
            insert_before: keywords.insert_before,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotateConfig {
    pub compact: bool,
    pub comment_marker: String,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            compact: false,
            comment_marker: "#".to_string(),
        }
    }
}

impl RepairConfig {
    /// Check everything except the oracle endpoint settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            issues.push(ValidationIssue::OutOfRange {
                field: "oracle.temperature",
                message: format!("{} is not within 0.0..=2.0", self.oracle.temperature),
            });
        }
        if self.oracle.timeout_secs == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "oracle.timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }

        for (field, keyword) in [
            ("actions.replace", &self.actions.replace),
            ("actions.insert_before", &self.actions.insert_before),
        ] {
            if keyword.trim().is_empty() {
                issues.push(ValidationIssue::MissingField { field });
            } else if keyword.contains(',') {
                issues.push(ValidationIssue::Invalid {
                    field,
                    message: "action keyword cannot contain ','".to_string(),
                });
            }
        }
        if self.actions.replace.trim() == self.actions.insert_before.trim() {
            issues.push(ValidationIssue::Invalid {
                field: "actions",
                message: "replace and insert_before keywords must differ".to_string(),
            });
        }

        if self.annotate.comment_marker.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "annotate.comment_marker",
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Settings needed before a network oracle can be contacted.
    pub fn validate_oracle(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        if self.oracle.model.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "oracle.model",
            });
        }
        if self.oracle.base_url.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "oracle.base_url",
            });
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn action_keywords(&self) -> ActionKeywords {
        ActionKeywords {
            replace: self.actions.replace.trim().to_string(),
            insert_before: self.actions.insert_before.trim().to_string(),
        }
    }

    pub fn annotator(&self) -> Annotator {
        let mode = if self.annotate.compact {
            AnnotateMode::Compact
        } else {
            AnnotateMode::Verbatim
        };
        Annotator::new(mode, self.annotate.comment_marker.clone())
    }

    /// `fix_system` with the action keywords filled in.
    pub fn fix_system_prompt(&self) -> String {
        let keywords = self.action_keywords();
        self.prompts
            .fix_system
            .replace("{replace}", &keywords.replace)
            .replace("{insert_before}", &keywords.insert_before)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    OutOfRange { field: &'static str, message: String },
    Invalid { field: &'static str, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::OutOfRange { field, message } => {
                write!(f, "'{field}' out of range: {message}")
            }
            ValidationIssue::Invalid { field, message } => {
                write!(f, "invalid '{field}': {message}")
            }
        }
    }
}
