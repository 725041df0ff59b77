//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{
    CameraBackend, CameraConfig, DispatchConfig, LoggingConfig, OcrEngineKind, RecognizerConfig,
    RelayConfig, RelayProviderKind, SnapSageConfig, VisionConfig,
};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default snapshot geometry, owned by the capturer.
pub use snapsage_media::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};

pub const DEFAULT_ENVIRONMENT_DEVICE: &str = "/dev/video0";
pub const DEFAULT_USER_DEVICE: &str = "/dev/video1";

pub const DEFAULT_TESSERACT_PATH: &str = "tesseract";
pub const DEFAULT_VISION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

/// Endpoint the bundled relay listens on by default, owned by the dispatch client.
pub use snapsage_dispatch::DEFAULT_ENDPOINT as DEFAULT_DISPATCH_ENDPOINT;

pub const DEFAULT_RELAY_BIND: &str = "127.0.0.1";
pub const DEFAULT_RELAY_PORT: u16 = 5000;
pub const DEFAULT_RELAY_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_RELAY_MAX_TOKENS: u32 = 512;
pub const DEFAULT_RELAY_TEMPERATURE: f32 = 0.7;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: SnapSageConfig) -> SnapSageConfig {
    let config = apply_logging_defaults(config);
    let config = apply_camera_defaults(config);
    let config = apply_recognizer_defaults(config);
    let config = apply_dispatch_defaults(config);
    apply_relay_defaults(config)
}

fn apply_logging_defaults(mut config: SnapSageConfig) -> SnapSageConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}

/// Device paths are only defaulted for the v4l2 backend; a still backend
/// without images simply has no cameras.
fn apply_camera_defaults(mut config: SnapSageConfig) -> SnapSageConfig {
    let camera = config.camera.get_or_insert_with(CameraConfig::default);
    let backend = *camera.backend.get_or_insert(CameraBackend::V4l2);
    if backend == CameraBackend::V4l2 {
        if camera.environment.is_none() {
            camera.environment = Some(DEFAULT_ENVIRONMENT_DEVICE.to_string());
        }
        if camera.user.is_none() {
            camera.user = Some(DEFAULT_USER_DEVICE.to_string());
        }
    }
    if camera.frame_width.is_none() {
        camera.frame_width = Some(DEFAULT_FRAME_WIDTH);
    }
    if camera.frame_height.is_none() {
        camera.frame_height = Some(DEFAULT_FRAME_HEIGHT);
    }
    config
}

fn apply_recognizer_defaults(mut config: SnapSageConfig) -> SnapSageConfig {
    let recognizer = config.recognizer.get_or_insert_with(RecognizerConfig::default);
    let engine = *recognizer.engine.get_or_insert(OcrEngineKind::Tesseract);
    if recognizer.tesseract_path.is_none() {
        recognizer.tesseract_path = Some(DEFAULT_TESSERACT_PATH.to_string());
    }
    if engine == OcrEngineKind::Vision {
        let vision = recognizer.vision.get_or_insert_with(VisionConfig::default);
        if vision.base_url.is_none() {
            vision.base_url = Some(DEFAULT_VISION_BASE_URL.to_string());
        }
        if vision.model.is_none() {
            vision.model = Some(DEFAULT_VISION_MODEL.to_string());
        }
    }
    config
}

fn apply_dispatch_defaults(mut config: SnapSageConfig) -> SnapSageConfig {
    let dispatch = config.dispatch.get_or_insert_with(DispatchConfig::default);
    if dispatch.endpoint.is_none() {
        dispatch.endpoint = Some(DEFAULT_DISPATCH_ENDPOINT.to_string());
    }
    config
}

fn apply_relay_defaults(mut config: SnapSageConfig) -> SnapSageConfig {
    let relay = config.relay.get_or_insert_with(RelayConfig::default);
    if relay.bind.is_none() {
        relay.bind = Some(DEFAULT_RELAY_BIND.to_string());
    }
    if relay.port.is_none() {
        relay.port = Some(DEFAULT_RELAY_PORT);
    }
    let provider = *relay.provider.get_or_insert(RelayProviderKind::Openai);
    if relay.base_url.is_none() {
        relay.base_url = match provider {
            RelayProviderKind::Openai => Some(DEFAULT_OPENAI_BASE_URL.to_string()),
            RelayProviderKind::Ollama => Some(DEFAULT_OLLAMA_BASE_URL.to_string()),
            RelayProviderKind::Mock => None,
        };
    }
    if relay.model.is_none() {
        relay.model = Some(DEFAULT_RELAY_MODEL.to_string());
    }
    if relay.max_tokens.is_none() {
        relay.max_tokens = Some(DEFAULT_RELAY_MAX_TOKENS);
    }
    if relay.temperature.is_none() {
        relay.temperature = Some(DEFAULT_RELAY_TEMPERATURE);
    }
    config
}
