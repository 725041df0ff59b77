//! Tesseract OCR through its command-line interface.
//!
//! The frame is written to a temporary PNG and recognized with
//! `tesseract <png> stdout -l <lang> tsv`. Line text is rebuilt from the TSV
//! word rows and the confidence is the mean over recognized words.

use std::path::PathBuf;

use async_trait::async_trait;
use snapsage_core::{EngineOutput, EngineProgress, FrameBuffer, OcrEngine, RecognitionError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::png::encode_png;
use crate::recognizer::RECOGNIZING_TEXT;

pub struct TesseractEngine {
    binary: String,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// First line of `tesseract --version`, e.g. `tesseract 5.3.0`.
    pub async fn version(&self) -> Result<String, RecognitionError> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| RecognitionError::Engine(format!("failed to run {}: {e}", self.binary)))?;
        // Older releases print the banner to stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        text.lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| RecognitionError::Engine("tesseract printed no version".into()))
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

/// Removes the temporary image however recognition ends.
struct TempImage(PathBuf);

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        frame: &FrameBuffer,
        language: &str,
        on_progress: &(dyn Fn(EngineProgress) + Send + Sync),
    ) -> Result<EngineOutput, RecognitionError> {
        on_progress(EngineProgress::new("initializing tesseract", 0.0));

        let png = encode_png(frame)?;
        let image = TempImage(std::env::temp_dir().join(format!("snapsage-ocr-{}.png", Uuid::new_v4())));
        tokio::fs::write(&image.0, &png)
            .await
            .map_err(|e| RecognitionError::Engine(format!("failed to write {}: {e}", image.0.display())))?;

        on_progress(EngineProgress::new(RECOGNIZING_TEXT, 0.0));
        debug!(binary = %self.binary, image = %image.0.display(), language, "Running tesseract");

        let output = tokio::process::Command::new(&self.binary)
            .arg(&image.0)
            .arg("stdout")
            .args(["-l", language])
            .arg("tsv")
            .output()
            .await
            .map_err(|e| RecognitionError::Engine(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let result = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        on_progress(EngineProgress::new(RECOGNIZING_TEXT, 1.0));
        info!(chars = result.text.len(), confidence = result.confidence, "Tesseract finished");
        Ok(result)
    }
}

/// Rebuild text from Tesseract TSV output.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. Only level-5 (word) rows with a
/// non-negative confidence count. Words on one line are joined by spaces,
/// lines by newlines, and paragraphs are separated by a blank line.
pub fn parse_tsv(tsv: &str) -> EngineOutput {
    let mut text = String::new();
    let mut confidences = Vec::new();
    let mut current_line: Option<(u32, u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let Ok(conf) = cols[10].trim().parse::<f32>() else {
            continue;
        };
        let word = cols[11].trim();
        if conf < 0.0 || word.is_empty() {
            continue;
        }
        let parse = |s: &str| s.parse::<u32>().unwrap_or(0);
        let line = (parse(cols[2]), parse(cols[3]), parse(cols[4]));

        match current_line {
            Some(prev) if prev == line => text.push(' '),
            Some((block, par, _)) if (block, par) == (line.0, line.1) => text.push('\n'),
            Some(_) => text.push_str("\n\n"),
            None => {}
        }
        text.push_str(word);
        confidences.push(conf);
        current_line = Some(line);
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };
    EngineOutput { text, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_lines_and_paragraphs() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t300\t200\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t40\t12\t96.0\tHello\n\
             5\t1\t1\t1\t1\t2\t55\t10\t45\t12\t90.0\tWorld\n\
             5\t1\t1\t1\t2\t1\t10\t30\t40\t12\t84.0\tsecond\n\
             5\t1\t2\t1\t1\t1\t10\t80\t40\t12\t70.0\tnext\n\
             5\t1\t2\t1\t1\t2\t60\t80\t40\t12\t-1\tnoise\n"
        );
        let out = parse_tsv(&tsv);
        assert_eq!(out.text, "Hello World\nsecond\n\nnext");
        assert!((out.confidence - 85.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_tsv_empty_page() {
        let tsv = format!("{HEADER}\n1\t1\t0\t0\t0\t0\t0\t0\t300\t200\t-1\t\n");
        let out = parse_tsv(&tsv);
        assert_eq!(out.text, "");
        assert_eq!(out.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_error() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary");
        let frame = FrameBuffer::new(2, 2, vec![0; 16]);
        let err = engine.recognize(&frame, "eng", &|_| {}).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Engine(_)));
        assert!(engine.version().await.is_err());
    }
}
