//! Still image files standing in for cameras.
//!
//! Each facing hint maps to an optional image path. Opening a hint decodes
//! the image once; the resulting stream reports that frame until stopped.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use snapsage_core::{DeviceError, DeviceHint, MediaDevices, RawFrame, VideoStream};
use tracing::debug;

use crate::mime_detect::{detect_mime_type, is_image};

#[derive(Debug, Default, Clone)]
pub struct StillImageDevices {
    images: HashMap<DeviceHint, PathBuf>,
}

impl StillImageDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, hint: DeviceHint, path: impl Into<PathBuf>) -> Self {
        self.images.insert(hint, path.into());
        self
    }

    /// The unconstrained attempt takes any configured image, preferring its own.
    fn resolve(&self, hint: DeviceHint) -> Option<&PathBuf> {
        match hint {
            DeviceHint::Any => self
                .images
                .get(&DeviceHint::Any)
                .or_else(|| self.images.get(&DeviceHint::Rear))
                .or_else(|| self.images.get(&DeviceHint::Front)),
            other => self.images.get(&other),
        }
    }
}

#[async_trait]
impl MediaDevices for StillImageDevices {
    fn name(&self) -> &str {
        "still"
    }

    async fn open(&self, hint: DeviceHint) -> Result<Arc<dyn VideoStream>, DeviceError> {
        let path = self
            .resolve(hint)
            .cloned()
            .ok_or_else(|| DeviceError::NotFound(format!("no image configured for {hint}")))?;

        let mime = detect_mime_type(&path);
        if !is_image(mime) {
            return Err(DeviceError::Other(format!(
                "{} is not an image ({mime})",
                path.display()
            )));
        }

        let frame = tokio::task::spawn_blocking(move || load_frame(&path))
            .await
            .map_err(|e| DeviceError::Other(format!("image loader panicked: {e}")))??;

        debug!(hint = %hint, width = frame.width, height = frame.height, "Still image opened");
        Ok(Arc::new(StillImageStream::new(frame)))
    }
}

fn load_frame(path: &Path) -> Result<RawFrame, DeviceError> {
    let img = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => match io.kind() {
            ErrorKind::NotFound => DeviceError::NotFound(path.display().to_string()),
            ErrorKind::PermissionDenied => DeviceError::PermissionDenied(path.display().to_string()),
            _ => DeviceError::Other(format!("{}: {io}", path.display())),
        },
        other => DeviceError::Other(format!("{}: {other}", path.display())),
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(RawFrame::new(width, height, rgba.into_raw()))
}

/// A stream that always presents the same frame.
pub struct StillImageStream {
    frame: RawFrame,
    live: AtomicBool,
}

impl StillImageStream {
    pub fn new(frame: RawFrame) -> Self {
        Self {
            frame,
            live: AtomicBool::new(true),
        }
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl VideoStream for StillImageStream {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Option<RawFrame> {
        self.is_live().then(|| self.frame.clone())
    }
}
