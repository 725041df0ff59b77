//! `snapsage-config`: SnapSage configuration management.
//!
//! Provides:
//! - Typed config schema (camera, recognizer, dispatch, relay, logging)
//! - YAML read/write with atomic backup rotation
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe display
//! - Default value application
//! - Schema validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use redact::redact;
pub use schema::{
    CameraBackend, CameraConfig, DispatchConfig, LoggingConfig, OcrEngineKind, RecognizerConfig,
    RelayConfig, RelayProviderKind, SnapSageConfig, VisionConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load, apply env substitution and defaults, then validate.
///
/// Validation findings are returned rather than logged; logging is not yet
/// initialised when the config is first read.
pub async fn load_and_prepare(path: &Path) -> Result<(SnapSageConfig, ValidationReport)> {
    let raw_config = load_config(path).await?;

    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;

    let config: SnapSageConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    Ok((config, report))
}
