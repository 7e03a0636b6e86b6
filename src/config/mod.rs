pub mod loader;
pub mod schema;

pub use loader::{
    api_key, apply_env, load_dotenv, load_from_path, load_from_str, resolve, ConfigError,
    DEFAULT_CONFIG_FILE,
};
pub use schema::{
    ActionConfig, AnnotateConfig, OracleConfig, PromptConfig, RepairConfig, ValidationError,
    ValidationIssue,
};
