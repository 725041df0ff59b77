//! Config file read/write with atomic backup rotation.

use crate::schema::SnapSageConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Number of rolling backups to keep.
const MAX_BACKUPS: usize = 3;

/// Resolve the SnapSage config directory.
/// Priority: `SNAPSAGE_CONFIG_DIR` env > `~/.snapsage/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SNAPSAGE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".snapsage"))
        .unwrap_or_else(|| PathBuf::from(".snapsage"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<SnapSageConfig> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(SnapSageConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    // An empty file is a valid "everything default" config.
    if raw.trim().is_empty() {
        return Ok(SnapSageConfig::default());
    }

    let config: SnapSageConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Write config to disk atomically (write to temp file, rename).
///
/// Creates a rolling backup of the previous config before overwriting.
pub async fn write_config(config: &SnapSageConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    if fs::try_exists(path).await.unwrap_or(false) {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// config.yaml.bak.1 → .bak.2 → ... → .bak.N, then copy the current file to .bak.1.
/// Backup failures are logged and never block the write.
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = path.with_extension(format!("yaml.bak.{i}"));
        let new = path.with_extension(format!("yaml.bak.{}", i + 1));
        if fs::try_exists(&old).await.unwrap_or(false) {
            if let Err(e) = fs::rename(&old, &new).await {
                warn!(backup = %old.display(), error = %e, "Failed to rotate config backup");
            }
        }
    }

    let bak = path.with_extension("yaml.bak.1");
    if let Err(e) = fs::copy(path, &bak).await {
        warn!(backup = %bak.display(), error = %e, "Failed to create config backup");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DispatchConfig;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "snapsage-config-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = scratch_dir("missing");
        let cfg = load_config(&config_file_path(&dir)).await.unwrap();
        assert!(cfg.dispatch.is_none());
    }

    #[tokio::test]
    async fn write_then_load_keeps_values_and_backs_up() {
        let dir = scratch_dir("write");
        let path = config_file_path(&dir);
        let mut cfg = SnapSageConfig::default();
        cfg.dispatch = Some(DispatchConfig {
            endpoint: Some("http://10.0.0.2:5000/chat".into()),
        });

        write_config(&cfg, &path).await.unwrap();
        write_config(&cfg, &path).await.unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(
            loaded.dispatch.unwrap().endpoint.as_deref(),
            Some("http://10.0.0.2:5000/chat")
        );
        assert!(path.with_extension("yaml.bak.1").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn invalid_yaml_is_an_error() {
        let dir = scratch_dir("invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = config_file_path(&dir);
        std::fs::write(&path, "camera: [not, a, map]").unwrap();
        assert!(load_config(&path).await.is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
