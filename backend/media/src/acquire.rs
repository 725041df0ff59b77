//! Device acquisition with ordered fallback across facing constraints.

use std::sync::Arc;

use snapsage_core::{AcquisitionError, CaptureSource, DeviceHint, MediaDevices};
use tracing::{error, info, warn};

/// Opens the first camera that honours a constraint in
/// [`DeviceHint::PREFERENCE_ORDER`].
pub struct DeviceAcquirer {
    devices: Arc<dyn MediaDevices>,
}

impl DeviceAcquirer {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self { devices }
    }

    pub fn backend(&self) -> &str {
        self.devices.name()
    }

    /// Try rear, then front, then any device. Each attempt is independent;
    /// the first success is returned and later constraints are never tried.
    pub async fn acquire(&self) -> Result<CaptureSource, AcquisitionError> {
        let mut attempts = Vec::with_capacity(DeviceHint::PREFERENCE_ORDER.len());

        for hint in DeviceHint::PREFERENCE_ORDER {
            match self.devices.open(hint).await {
                Ok(stream) => {
                    info!(
                        backend = self.devices.name(),
                        hint = %hint,
                        facing_mode = hint.facing_mode().unwrap_or("unconstrained"),
                        failed_attempts = attempts.len(),
                        "Camera acquired"
                    );
                    let label = format!("{}:{}", self.devices.name(), hint);
                    return Ok(CaptureSource::new(hint, label, stream));
                }
                Err(e) => {
                    warn!(backend = self.devices.name(), hint = %hint, error = %e, "Camera attempt failed");
                    attempts.push((hint, e));
                }
            }
        }

        let err = AcquisitionError::new(attempts);
        error!(backend = self.devices.name(), error = %err, "No camera could be opened");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snapsage_core::{DeviceError, RawFrame, VideoStream};
    use std::sync::Mutex;

    struct LiveStream;

    impl VideoStream for LiveStream {
        fn is_live(&self) -> bool {
            true
        }

        fn current_frame(&self) -> Option<RawFrame> {
            None
        }
    }

    /// Succeeds only for the listed hints and records every attempt.
    struct ScriptedDevices {
        available: Vec<DeviceHint>,
        attempts: Mutex<Vec<DeviceHint>>,
    }

    impl ScriptedDevices {
        fn new(available: &[DeviceHint]) -> Arc<Self> {
            Arc::new(Self {
                available: available.to_vec(),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<DeviceHint> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaDevices for ScriptedDevices {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn open(&self, hint: DeviceHint) -> Result<Arc<dyn VideoStream>, DeviceError> {
            self.attempts.lock().unwrap().push(hint);
            if self.available.contains(&hint) {
                Ok(Arc::new(LiveStream))
            } else if hint == DeviceHint::Any {
                Err(DeviceError::PermissionDenied("denied".into()))
            } else {
                Err(DeviceError::NotFound(hint.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_rear_camera_wins_first() {
        let devices = ScriptedDevices::new(&[DeviceHint::Rear, DeviceHint::Front]);
        let acquirer = DeviceAcquirer::new(devices.clone());
        let source = acquirer.acquire().await.unwrap();
        assert_eq!(source.device_hint(), DeviceHint::Rear);
        assert!(source.is_active());
        assert_eq!(devices.attempts(), vec![DeviceHint::Rear]);
    }

    #[tokio::test]
    async fn test_falls_back_to_front() {
        let devices = ScriptedDevices::new(&[DeviceHint::Front]);
        let source = DeviceAcquirer::new(devices.clone()).acquire().await.unwrap();
        assert_eq!(source.device_hint(), DeviceHint::Front);
        assert_eq!(devices.attempts(), vec![DeviceHint::Rear, DeviceHint::Front]);
    }

    #[tokio::test]
    async fn test_unconstrained_is_last_resort() {
        let devices = ScriptedDevices::new(&[DeviceHint::Any]);
        let source = DeviceAcquirer::new(devices.clone()).acquire().await.unwrap();
        assert_eq!(source.device_hint(), DeviceHint::Any);
        assert_eq!(source.label(), "scripted:any");
        assert_eq!(devices.attempts(), DeviceHint::PREFERENCE_ORDER.to_vec());
    }

    #[tokio::test]
    async fn test_all_failures_carry_guidance() {
        let devices = ScriptedDevices::new(&[]);
        let err = DeviceAcquirer::new(devices.clone()).acquire().await.unwrap_err();
        assert_eq!(err.attempts.len(), 3);
        assert!(matches!(err.last_cause(), Some(DeviceError::PermissionDenied(_))));
        let guidance = err.guidance.to_lowercase();
        assert!(guidance.contains("permission"));
        assert!(guidance.contains("https"));
        assert_eq!(devices.attempts().len(), 3);
    }
}
