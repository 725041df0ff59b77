//! Still-frame capture into a fixed-size raster.

use image::{imageops, imageops::FilterType, RgbaImage};
use snapsage_core::{CaptureError, CaptureSource, FrameBuffer};
use tracing::debug;

pub const DEFAULT_FRAME_WIDTH: u32 = 300;
pub const DEFAULT_FRAME_HEIGHT: u32 = 200;

/// Snapshots the current frame of a source, stretch-scaled to a target size
/// that never changes for the lifetime of the capturer.
#[derive(Debug, Clone, Copy)]
pub struct FrameCapturer {
    width: u32,
    height: u32,
}

impl Default for FrameCapturer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT)
    }
}

impl FrameCapturer {
    /// Zero dimensions are clamped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn capture(&self, source: &CaptureSource) -> Result<FrameBuffer, CaptureError> {
        if !source.is_active() {
            return Err(CaptureError::Inactive);
        }
        let frame = source.current_frame().ok_or(CaptureError::NoFrame)?;

        if frame.width == 0 || frame.height == 0 || frame.data.len() != frame.expected_len() {
            return Err(CaptureError::Malformed(format!(
                "{}x{} frame carries {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.data.len(),
                frame.expected_len()
            )));
        }

        if frame.width == self.width && frame.height == self.height {
            return Ok(FrameBuffer::new(self.width, self.height, frame.data.to_vec()));
        }

        let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .ok_or_else(|| CaptureError::Malformed("pixel buffer does not match dimensions".into()))?;
        let scaled = imageops::resize(&image, self.width, self.height, FilterType::Triangle);

        debug!(
            source = source.label(),
            from_width = frame.width,
            from_height = frame.height,
            to_width = self.width,
            to_height = self.height,
            "Frame scaled"
        );
        Ok(FrameBuffer::new(self.width, self.height, scaled.into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsage_core::{DeviceHint, RawFrame, VideoStream};
    use std::sync::Arc;

    struct FixedStream {
        live: bool,
        frame: Option<RawFrame>,
    }

    impl VideoStream for FixedStream {
        fn is_live(&self) -> bool {
            self.live
        }

        fn current_frame(&self) -> Option<RawFrame> {
            self.frame.clone()
        }
    }

    fn source(live: bool, frame: Option<RawFrame>) -> CaptureSource {
        CaptureSource::new(DeviceHint::Rear, "test", Arc::new(FixedStream { live, frame }))
    }

    fn solid(width: u32, height: u32, px: [u8; 4]) -> RawFrame {
        let data = px.iter().copied().cycle().take((width * height * 4) as usize).collect();
        RawFrame::new(width, height, data)
    }

    #[test]
    fn test_scales_to_fixed_dimensions() {
        let capturer = FrameCapturer::default();
        for (w, h) in [(640, 480), (1920, 1080), (120, 90)] {
            let buf = capturer
                .capture(&source(true, Some(solid(w, h, [10, 20, 30, 255]))))
                .unwrap();
            assert_eq!((buf.width, buf.height), (300, 200));
            assert_eq!(buf.data.len(), 300 * 200 * 4);
            assert_eq!(&buf.data[..4], &[10, 20, 30, 255]);
        }
    }

    #[test]
    fn test_inactive_source() {
        let err = FrameCapturer::default()
            .capture(&source(false, Some(solid(4, 4, [0; 4]))))
            .unwrap_err();
        assert_eq!(err, CaptureError::Inactive);
    }

    #[test]
    fn test_no_frame_yet() {
        let err = FrameCapturer::default().capture(&source(true, None)).unwrap_err();
        assert_eq!(err, CaptureError::NoFrame);
    }

    #[test]
    fn test_malformed_frame() {
        let bad = RawFrame::new(10, 10, vec![0; 7]);
        let err = FrameCapturer::default().capture(&source(true, Some(bad))).unwrap_err();
        assert!(matches!(err, CaptureError::Malformed(_)));
    }

    #[test]
    fn test_zero_dimensions_clamped() {
        assert_eq!(FrameCapturer::new(0, 0).dimensions(), (1, 1));
    }
}
