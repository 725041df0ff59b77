use std::path::Path;

use anyhow::{bail, Context, Result};

use snapsage_config::{apply_all_defaults, redact, write_config, SnapSageConfig};

use crate::terminal_output::note_success;

/// Print the effective config as YAML with secrets masked.
pub fn show(config: &SnapSageConfig) -> Result<()> {
    print!("{}", render_redacted(config)?);
    Ok(())
}

fn render_redacted(config: &SnapSageConfig) -> Result<String> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    serde_yaml::to_string(&redact(&value)).context("Failed to render config as YAML")
}

/// Write a config with every default filled in.
pub async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    write_config(&apply_all_defaults(SnapSageConfig::default()), path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsage_config::{load_config, RelayConfig};

    #[test]
    fn test_show_masks_api_keys() {
        let config = SnapSageConfig {
            relay: Some(RelayConfig {
                api_key: Some("sk-live-1234567890abcdef".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let yaml = render_redacted(&config).unwrap();
        assert!(!yaml.contains("sk-live-1234567890abcdef"));
        assert!(yaml.contains("sk-l***"));
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("snapsage-init-{}", std::process::id()));
        let path = dir.join("config.yaml");

        init(&path, false).await.unwrap();
        let written = load_config(&path).await.unwrap();
        assert_eq!(
            written.dispatch.and_then(|d| d.endpoint).as_deref(),
            Some("http://localhost:5000/chat")
        );

        assert!(init(&path, false).await.is_err());
        init(&path, true).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
