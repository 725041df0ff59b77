pub mod png;
pub mod recognizer;
pub mod tesseract;
pub mod vision;

pub use recognizer::{RecognizerAdapter, LANGUAGE, RECOGNIZING_TEXT};
pub use tesseract::{parse_tsv, TesseractEngine};
pub use vision::VisionOcrEngine;
