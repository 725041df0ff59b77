//! MIME type detection for still-image files.
//!
//! Used to reject paths the decoder cannot read before opening them.

use std::path::Path;

use image::ImageFormat;

const OCTET_STREAM: &str = "application/octet-stream";

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    if let Ok(format) = ImageFormat::from_path(path) {
        return format.to_mime_type();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => OCTET_STREAM,
    }
}

/// An image type whose decoder is compiled in.
pub fn is_image(mime: &str) -> bool {
    ImageFormat::from_mime_type(mime).is_some_and(|format| format.reading_enabled())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_jpeg() {
        assert_eq!(detect_mime_type(&PathBuf::from("page.JPG")), "image/jpeg");
        assert!(is_image("image/png"));
    }

    #[test]
    fn text_is_not_image() {
        assert_eq!(detect_mime_type(&PathBuf::from("notes.txt")), "text/plain");
        assert!(!is_image(detect_mime_type(&PathBuf::from("notes.txt"))));
    }

    #[test]
    fn unknown_extension_fallback() {
        assert_eq!(detect_mime_type(&PathBuf::from("file.xyz")), OCTET_STREAM);
        assert!(!is_image(OCTET_STREAM));
    }
}
