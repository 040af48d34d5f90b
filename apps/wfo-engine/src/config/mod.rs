//! Run configuration.
//!
//! Provides YAML loading, validation, and environment variable
//! interpolation for a walk-forward run.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wfo_engine::config::load_config;
//!
//! // Load from default path (wfo.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("runs/btc.yaml"))?;
//!
//! println!("IS days: {}", config.walk_forward.is_period_days);
//! ```

mod observability;
mod preview;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::parallel::ParallelConfig;
use crate::backtest::params::ParameterSpace;
use crate::backtest::search::SearchConfig;
use crate::backtest::walkforward::WalkForwardConfig;

pub use observability::{LoggingConfig, ObservabilityConfig};
pub use preview::{PlanPreview, PreviewConfig};

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "wfo.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Window layout, adaptive triggers and forward test.
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
    /// Per-window parameter search.
    #[serde(default)]
    pub search: SearchConfig,
    /// Parameter space in declaration order.
    pub parameters: ParameterSpace,
    /// Worker pool.
    #[serde(default)]
    pub parallel: ParallelConfig,
    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Plan preview grid for the binary.
    #[serde(default)]
    pub preview: PreviewConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to [`DEFAULT_CONFIG_PATH`].
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<RunConfig, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<RunConfig, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: RunConfig = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    let invalid = |e: &dyn std::fmt::Display| ConfigError::ValidationError(e.to_string());

    config.walk_forward.validate().map_err(|e| invalid(&e))?;
    config.search.validate().map_err(|e| invalid(&e))?;
    config.parameters.validate().map_err(|e| invalid(&e))?;

    let logging = &config.observability.logging;
    if !LoggingConfig::FORMATS.contains(&logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {:?}",
            LoggingConfig::FORMATS
        )));
    }

    let preview = &config.preview;
    if preview.bar_minutes == 0 {
        return Err(ConfigError::ValidationError(
            "preview.bar_minutes must be positive".to_string(),
        ));
    }
    if preview.end <= preview.start {
        return Err(ConfigError::ValidationError(
            "preview.end must be after preview.start".to_string(),
        ));
    }

    Ok(())
}
