//! CLI Doctor Command
//!
//! Checks everything a capture cycle depends on before the user points the
//! camera at something: the config and its env vars, the OCR engine, the
//! camera devices and the reasoning endpoint.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;

use snapsage_config::{
    collect_referenced_vars, load_and_prepare, load_config, CameraBackend, OcrEngineKind,
    SnapSageConfig,
};
use snapsage_dispatch::DEFAULT_ENDPOINT;
use snapsage_media::{detect_mime_type, is_image};
use snapsage_understanding::TesseractEngine;

use crate::terminal_output::{render_table, Column};

const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pass,
    Warn,
    Fail,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Pass => "🟢 ok",
            Status::Warn => "🟡 warn",
            Status::Fail => "🔴 fail",
        }
    }
}

#[derive(Debug)]
struct Check {
    name: String,
    status: Status,
    detail: String,
}

impl Check {
    fn new(name: impl Into<String>, status: Status, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

/// Executes the full doctor diagnosis.
pub async fn run(config_path: &Path) -> Result<ExitCode> {
    println!("\n🔍 Running SnapSage Doctor...\n");

    let mut checks = Vec::new();
    if let Some(config) = check_config(config_path, &mut checks).await {
        checks.push(check_recognizer(&config).await);
        checks.extend(check_camera(&config));
        checks.push(check_endpoint(&config).await);
    }

    let rows: Vec<Vec<String>> = checks
        .iter()
        .map(|c| vec![c.name.clone(), c.status.label().to_string(), c.detail.clone()])
        .collect();
    print!(
        "{}",
        render_table(
            &[Column::left("Check"), Column::right("Status"), Column::left("Detail")],
            &rows
        )
    );

    println!();
    if checks.iter().any(|c| c.status == Status::Fail) {
        println!("❌ Some checks failed! Please fix the errors above.");
        Ok(ExitCode::FAILURE)
    } else {
        println!("✅ All checks passed! SnapSage is ready.");
        Ok(ExitCode::SUCCESS)
    }
}

/// Raw parse, referenced env vars, then the prepared config and its report.
async fn check_config(path: &Path, checks: &mut Vec<Check>) -> Option<SnapSageConfig> {
    let raw = match load_config(path).await {
        Ok(raw) => raw,
        Err(e) => {
            checks.push(Check::new("config", Status::Fail, format!("{e:#}")));
            return None;
        }
    };
    checks.push(Check::new("config", Status::Pass, path.display().to_string()));

    if let Ok(value) = serde_json::to_value(&raw) {
        for var in collect_referenced_vars(&value) {
            let check = match std::env::var(&var) {
                Ok(v) if !v.is_empty() => Check::new(format!("env {var}"), Status::Pass, "set"),
                _ => Check::new(format!("env {var}"), Status::Fail, "referenced but not set"),
            };
            checks.push(check);
        }
    }

    let (config, report) = match load_and_prepare(path).await {
        Ok(prepared) => prepared,
        Err(e) => {
            checks.push(Check::new("config", Status::Fail, format!("{e:#}")));
            return None;
        }
    };
    for err in &report.errors {
        checks.push(Check::new(err.path.clone(), Status::Fail, err.message.clone()));
    }
    for warning in &report.warnings {
        checks.push(Check::new(warning.path.clone(), Status::Warn, warning.message.clone()));
    }
    Some(config)
}

async fn check_recognizer(config: &SnapSageConfig) -> Check {
    let recognizer = config.recognizer.clone().unwrap_or_default();
    match recognizer.engine.unwrap_or(OcrEngineKind::Tesseract) {
        OcrEngineKind::Tesseract => {
            let engine = match &recognizer.tesseract_path {
                Some(path) => TesseractEngine::new(path),
                None => TesseractEngine::default(),
            };
            match engine.version().await {
                Ok(version) => Check::new("tesseract", Status::Pass, version),
                Err(e) => Check::new("tesseract", Status::Fail, e.to_string()),
            }
        }
        OcrEngineKind::Vision => {
            let has_key = recognizer
                .vision
                .and_then(|v| v.api_key)
                .is_some_and(|k| !k.is_empty());
            if has_key {
                Check::new("vision ocr", Status::Pass, "api key configured")
            } else {
                Check::new("vision ocr", Status::Fail, "recognizer.vision.apiKey is not set")
            }
        }
    }
}

fn check_camera(config: &SnapSageConfig) -> Vec<Check> {
    let camera = config.camera.clone().unwrap_or_default();
    let configured: Vec<(&str, String)> = [
        ("environment", camera.environment.clone()),
        ("user", camera.user.clone()),
        ("any", camera.any.clone()),
    ]
    .into_iter()
    .filter_map(|(role, path)| path.map(|p| (role, p)))
    .collect();

    match camera.backend.unwrap_or(CameraBackend::V4l2) {
        CameraBackend::Still => {
            if configured.is_empty() {
                return vec![Check::new("camera", Status::Fail, "no still images configured")];
            }
            configured
                .into_iter()
                .map(|(role, path)| {
                    let p = Path::new(&path);
                    let name = format!("camera {role}");
                    if !p.exists() {
                        Check::new(name, Status::Fail, format!("{path} does not exist"))
                    } else if !is_image(detect_mime_type(p)) {
                        Check::new(name, Status::Fail, format!("{path} is not an image"))
                    } else {
                        Check::new(name, Status::Pass, path)
                    }
                })
                .collect()
        }
        CameraBackend::V4l2 => check_video_nodes(configured),
    }
}

#[cfg(target_os = "linux")]
fn check_video_nodes(configured: Vec<(&str, String)>) -> Vec<Check> {
    let mut checks: Vec<Check> = configured
        .into_iter()
        .map(|(role, path)| {
            let name = format!("camera {role}");
            if Path::new(&path).exists() {
                Check::new(name, Status::Pass, path)
            } else {
                Check::new(name, Status::Warn, format!("{path} not present"))
            }
        })
        .collect();

    let nodes = snapsage_media::list_video_nodes();
    if nodes.is_empty() {
        checks.push(Check::new("video devices", Status::Fail, "no /dev/video* nodes found"));
    } else {
        let names: Vec<String> = nodes.iter().map(|p| p.display().to_string()).collect();
        checks.push(Check::new("video devices", Status::Pass, names.join(", ")));
    }
    checks
}

#[cfg(not(target_os = "linux"))]
fn check_video_nodes(_configured: Vec<(&str, String)>) -> Vec<Check> {
    vec![Check::new(
        "video devices",
        Status::Fail,
        "the v4l2 backend is only available on Linux",
    )]
}

/// Any HTTP answer counts as reachable; only connection failures fail.
async fn check_endpoint(config: &SnapSageConfig) -> Check {
    let endpoint = config
        .dispatch
        .as_ref()
        .and_then(|d| d.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    let client = match reqwest::Client::builder().timeout(ENDPOINT_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return Check::new("endpoint", Status::Fail, e.to_string()),
    };
    match client.get(&endpoint).send().await {
        Ok(resp) => Check::new(
            "endpoint",
            Status::Pass,
            format!("{endpoint} reachable (HTTP {})", resp.status().as_u16()),
        ),
        Err(e) => Check::new("endpoint", Status::Fail, format!("{endpoint}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsage_config::{apply_all_defaults, CameraConfig, DispatchConfig};

    #[test]
    fn test_still_camera_checks() {
        let config = SnapSageConfig {
            camera: Some(CameraConfig {
                backend: Some(CameraBackend::Still),
                environment: Some("/definitely/not/here.png".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let checks = check_camera(&config);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, Status::Fail);

        let empty = SnapSageConfig {
            camera: Some(CameraConfig {
                backend: Some(CameraBackend::Still),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(check_camera(&empty)[0].detail, "no still images configured");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let config = SnapSageConfig {
            dispatch: Some(DispatchConfig {
                endpoint: Some("http://127.0.0.1:1/chat".into()),
            }),
            ..Default::default()
        };
        assert_eq!(check_endpoint(&config).await.status, Status::Fail);
    }

    #[tokio::test]
    async fn test_missing_tesseract_binary_fails() {
        let mut config = apply_all_defaults(SnapSageConfig::default());
        if let Some(recognizer) = config.recognizer.as_mut() {
            recognizer.tesseract_path = Some("/nonexistent/tesseract".into());
        }
        assert_eq!(check_recognizer(&config).await.status, Status::Fail);
    }

    #[tokio::test]
    async fn test_missing_env_var_reported() {
        let dir = std::env::temp_dir().join(format!("snapsage-doctor-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        std::fs::write(&path, "relay:\n  apiKey: ${SNAPSAGE_DOCTOR_TEST_UNSET_KEY}\n").unwrap();

        let mut checks = Vec::new();
        let config = check_config(&path, &mut checks).await;
        assert!(config.is_none());
        assert!(checks
            .iter()
            .any(|c| c.name == "env SNAPSAGE_DOCTOR_TEST_UNSET_KEY" && c.status == Status::Fail));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
