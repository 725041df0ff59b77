//! Config validation: deep schema checks with user-friendly error messages.

use crate::schema::{OcrEngineKind, RelayProviderKind, SnapSageConfig};
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SnapSageConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_logging(config, &mut report);
    validate_camera(config, &mut report);
    validate_recognizer(config, &mut report);
    validate_dispatch(config, &mut report);
    validate_relay(config, &mut report);
    report
}

fn validate_logging(config: &SnapSageConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !matches!(
            level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            report.warn(
                "logging.level",
                format!("Unknown log level '{level}'; expected trace, debug, info, warn or error"),
            );
        }
    }
}

fn validate_camera(config: &SnapSageConfig, report: &mut ValidationReport) {
    let Some(camera) = &config.camera else { return };
    if camera.frame_width == Some(0) {
        report.error("camera.frameWidth", "frameWidth must be > 0");
    }
    if camera.frame_height == Some(0) {
        report.error("camera.frameHeight", "frameHeight must be > 0");
    }
    if camera.environment.is_none() && camera.user.is_none() && camera.any.is_none() {
        report.warn(
            "camera",
            "No camera devices configured; acquisition will fall back to probing",
        );
    }
}

fn validate_recognizer(config: &SnapSageConfig, report: &mut ValidationReport) {
    let Some(recognizer) = &config.recognizer else { return };
    if recognizer.engine == Some(OcrEngineKind::Vision) {
        let key_missing = recognizer
            .vision
            .as_ref()
            .and_then(|v| v.api_key.as_deref())
            .map(str::is_empty)
            .unwrap_or(true);
        if key_missing {
            report.error(
                "recognizer.vision.apiKey",
                "The vision engine requires an API key",
            );
        }
    }
}

fn validate_dispatch(config: &SnapSageConfig, report: &mut ValidationReport) {
    let Some(dispatch) = &config.dispatch else { return };
    if let Some(endpoint) = &dispatch.endpoint {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            report.error(
                "dispatch.endpoint",
                format!("Endpoint '{endpoint}' must be an http:// or https:// URL"),
            );
        }
    }
}

fn validate_relay(config: &SnapSageConfig, report: &mut ValidationReport) {
    let Some(relay) = &config.relay else { return };
    if relay.port == Some(0) {
        report.error("relay.port", "port must be > 0");
    }
    if let Some(port) = relay.port {
        if port != 0 && port < 1024 {
            report.warn(
                "relay.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
    if relay.provider == Some(RelayProviderKind::Openai)
        && relay.api_key.as_deref().map(str::is_empty).unwrap_or(true)
    {
        report.warn(
            "relay.apiKey",
            "No API key for the openai provider; relay requests will fail",
        );
    }
    if let Some(t) = relay.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("relay.temperature", "temperature must be between 0 and 2");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{CameraConfig, DispatchConfig, RecognizerConfig, RelayConfig};

    #[test]
    fn empty_config_is_valid() {
        let report = validate(&SnapSageConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn defaults_are_valid_but_warn_about_missing_key() {
        let report = validate(&apply_all_defaults(SnapSageConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.iter().any(|w| w.path == "relay.apiKey"));
    }

    #[test]
    fn zero_frame_width_is_error() {
        let mut cfg = SnapSageConfig::default();
        cfg.camera = Some(CameraConfig {
            frame_width: Some(0),
            environment: Some("/dev/video0".into()),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "camera.frameWidth");
    }

    #[test]
    fn non_http_endpoint_is_error() {
        let mut cfg = SnapSageConfig::default();
        cfg.dispatch = Some(DispatchConfig {
            endpoint: Some("localhost:5000/chat".into()),
        });
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "dispatch.endpoint"));
    }

    #[test]
    fn vision_without_key_is_error() {
        let mut cfg = SnapSageConfig::default();
        cfg.recognizer = Some(RecognizerConfig {
            engine: Some(OcrEngineKind::Vision),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(report
            .errors
            .iter()
            .any(|e| e.path == "recognizer.vision.apiKey"));
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = SnapSageConfig::default();
        cfg.relay = Some(RelayConfig {
            port: Some(0),
            provider: Some(RelayProviderKind::Mock),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "relay.port"));
    }
}
