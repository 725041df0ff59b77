use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use snapsage_core::{FrameBuffer, RecognitionError};

/// Encode an RGBA frame as PNG bytes for engines that take image files.
pub fn encode_png(frame: &FrameBuffer) -> Result<Vec<u8>, RecognitionError> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
        RecognitionError::InvalidInput(format!("{frame:?} does not match its dimensions"))
    })?;
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| RecognitionError::Engine(format!("PNG encoding failed: {e}")))?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_signature() {
        let png = encode_png(&FrameBuffer::new(3, 2, vec![128; 24])).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(encode_png(&FrameBuffer::new(3, 2, vec![0; 5])).is_err());
    }
}
