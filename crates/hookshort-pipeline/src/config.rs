//! Configuration loading.
//!
//! Sources, lowest priority first: built-in defaults, a JSON file
//! (`--config` or `HOOKSHORT_CONFIG`), then `HOOKSHORT_*` environment
//! variables. The result is validated once and never changes afterwards.

use std::path::{Path, PathBuf};
use thiserror::Error;

use hookshort_models::{MismatchPolicy, PipelineConfig};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "HOOKSHORT_CONFIG";

const HOOK_LENGTH_VAR: &str = "HOOKSHORT_HOOK_LENGTH";
const PLATFORM_VAR: &str = "HOOKSHORT_PLATFORM";
const MISMATCH_POLICY_VAR: &str = "HOOKSHORT_MISMATCH_POLICY";
const WORK_DIR_VAR: &str = "HOOKSHORT_WORK_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value '{value}' for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load the configuration from the process environment.
///
/// `explicit_path` wins over `HOOKSHORT_CONFIG`.
pub fn load(explicit_path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    load_with(explicit_path, |key| std::env::var(key).ok())
}

/// Load the configuration reading variables through `env`.
pub fn load_with<F>(explicit_path: Option<&Path>, env: F) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| env(CONFIG_PATH_VAR).map(PathBuf::from));

    let config = match file {
        Some(path) => from_file(&path)?,
        None => PipelineConfig::default(),
    };

    let config = apply_env_overrides(config, &env)?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

fn from_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    PipelineConfig::from_json(&json).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides<F>(mut config: PipelineConfig, env: &F) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env(HOOK_LENGTH_VAR) {
        config.default_hook_length = value.trim().parse().map_err(|_| ConfigError::Env {
            var: HOOK_LENGTH_VAR,
            value: value.clone(),
            reason: "expected a number of seconds".to_string(),
        })?;
    }

    if let Some(value) = env(PLATFORM_VAR) {
        config.default_platform = value.trim().to_string();
    }

    if let Some(value) = env(MISMATCH_POLICY_VAR) {
        config.mismatch_policy = value.parse::<MismatchPolicy>().map_err(|e| ConfigError::Env {
            var: MISMATCH_POLICY_VAR,
            value: value.clone(),
            reason: e.to_string(),
        })?;
    }

    if let Some(value) = env(WORK_DIR_VAR) {
        if !value.trim().is_empty() {
            config.work_dir = Some(PathBuf::from(value));
        }
    }

    Ok(config)
}
