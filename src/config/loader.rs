use crate::config::schema::{RepairConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file picked up from the working directory when no
/// explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "linefix.toml";

pub const ENV_BASE_URL: &str = "URL_LLM";
pub const ENV_MODEL: &str = "MODEL_LLM";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse config TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<RepairConfig, ConfigError> {
    let config: RepairConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RepairConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load the effective configuration.
///
/// Priority order:
/// 1. Explicit path
/// 2. `linefix.toml` in `dir`
/// 3. Built-in defaults
///
/// Environment overrides are applied on top, then the result is validated
/// again.
pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<RepairConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => load_from_path(path)?,
        None => {
            let candidate = dir.join(DEFAULT_CONFIG_FILE);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "Using config file from working directory");
                load_from_path(&candidate)?
            } else {
                RepairConfig::default()
            }
        }
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

/// Override oracle settings from environment variables.
pub fn apply_env(config: &mut RepairConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
        config.oracle.base_url = url;
    }
    if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
        config.oracle.model = model;
    }
}

/// API key from the variable named in `oracle.api_key_env`.
pub fn api_key(config: &RepairConfig) -> Option<String> {
    std::env::var(&config.oracle.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Load `<dir>/.env` into the process environment if it exists.
///
/// Variables already set in the environment win.
pub fn load_dotenv(dir: &Path) -> bool {
    let path = dir.join(".env");
    if !path.is_file() {
        return false;
    }
    match dotenvy::from_path(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "Loaded environment file");
            true
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Ignoring unreadable environment file");
            false
        }
    }
}
