//! Builds pipeline collaborators from the loaded config.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use snapsage_config::defaults::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_VISION_BASE_URL, DEFAULT_VISION_MODEL};
use snapsage_config::{CameraBackend, CameraConfig, OcrEngineKind, RecognizerConfig, SnapSageConfig};
use snapsage_core::{DeviceHint, MediaDevices, OcrEngine};
use snapsage_dispatch::{HttpDispatchClient, DEFAULT_ENDPOINT};
use snapsage_logging::EventLogger;
use snapsage_media::{DeviceAcquirer, FrameCapturer, StillImageDevices};
use snapsage_pipeline::PipelineController;
use snapsage_understanding::{RecognizerAdapter, TesseractEngine, VisionOcrEngine};

pub fn media_devices(camera: &CameraConfig) -> Result<Arc<dyn MediaDevices>> {
    match camera.backend.unwrap_or(CameraBackend::V4l2) {
        CameraBackend::Still => {
            let mut devices = StillImageDevices::new();
            for (hint, path) in [
                (DeviceHint::Rear, &camera.environment),
                (DeviceHint::Front, &camera.user),
                (DeviceHint::Any, &camera.any),
            ] {
                if let Some(path) = path {
                    devices = devices.with_image(hint, path);
                }
            }
            Ok(Arc::new(devices))
        }
        CameraBackend::V4l2 => v4l2_devices(camera),
    }
}

#[cfg(target_os = "linux")]
fn v4l2_devices(camera: &CameraConfig) -> Result<Arc<dyn MediaDevices>> {
    Ok(Arc::new(snapsage_media::V4l2Devices::new(
        camera.environment.as_ref().map(PathBuf::from),
        camera.user.as_ref().map(PathBuf::from),
        camera.any.as_ref().map(PathBuf::from),
    )))
}

#[cfg(not(target_os = "linux"))]
fn v4l2_devices(_camera: &CameraConfig) -> Result<Arc<dyn MediaDevices>> {
    bail!("the v4l2 camera backend is only available on Linux; set camera.backend to still")
}

pub fn ocr_engine(recognizer: &RecognizerConfig) -> Result<Arc<dyn OcrEngine>> {
    match recognizer.engine.unwrap_or(OcrEngineKind::Tesseract) {
        OcrEngineKind::Tesseract => {
            let engine = match &recognizer.tesseract_path {
                Some(path) => TesseractEngine::new(path),
                None => TesseractEngine::default(),
            };
            Ok(Arc::new(engine))
        }
        OcrEngineKind::Vision => {
            let vision = recognizer.vision.clone().unwrap_or_default();
            let Some(api_key) = vision.api_key.filter(|k| !k.is_empty()) else {
                bail!("recognizer.vision.apiKey is required for the vision engine");
            };
            Ok(Arc::new(VisionOcrEngine::new(
                vision.base_url.as_deref().unwrap_or(DEFAULT_VISION_BASE_URL),
                api_key,
                vision.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL),
            )))
        }
    }
}

/// Assemble a controller around `devices`; everything else comes from config.
pub fn build_controller(
    config: &SnapSageConfig,
    devices: Arc<dyn MediaDevices>,
) -> Result<PipelineController> {
    let camera = config.camera.clone().unwrap_or_default();
    let capturer = FrameCapturer::new(
        camera.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH),
        camera.frame_height.unwrap_or(DEFAULT_FRAME_HEIGHT),
    );

    let recognizer = config.recognizer.clone().unwrap_or_default();
    let recognizer = RecognizerAdapter::new(ocr_engine(&recognizer)?);

    let endpoint = config
        .dispatch
        .as_ref()
        .and_then(|d| d.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    info!(engine = recognizer.engine_name(), endpoint = %endpoint, "Pipeline assembled");
    let dispatcher = Arc::new(HttpDispatchClient::new(endpoint));

    Ok(PipelineController::new(
        DeviceAcquirer::new(devices),
        capturer,
        recognizer,
        dispatcher,
    ))
}

/// Forward every pipeline event to the event log until the controller is dropped.
pub fn spawn_event_logger(controller: &PipelineController) -> JoinHandle<()> {
    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => EventLogger::log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsage_config::{apply_all_defaults, VisionConfig};

    #[test]
    fn test_still_backend_registers_configured_images() {
        let camera = CameraConfig {
            backend: Some(CameraBackend::Still),
            environment: Some("/tmp/page.png".into()),
            ..Default::default()
        };
        assert_eq!(media_devices(&camera).unwrap().name(), "still");
    }

    #[test]
    fn test_vision_engine_requires_key() {
        let recognizer = RecognizerConfig {
            engine: Some(OcrEngineKind::Vision),
            vision: Some(VisionConfig::default()),
            ..Default::default()
        };
        assert!(ocr_engine(&recognizer).is_err());
    }

    #[tokio::test]
    async fn test_build_controller_from_defaults() {
        let config = apply_all_defaults(SnapSageConfig::default());
        let devices: Arc<dyn MediaDevices> = Arc::new(StillImageDevices::new());
        let controller = build_controller(&config, devices).unwrap();
        assert!(!controller.is_ready());
        assert_eq!(controller.engine_name(), "tesseract");
    }
}
