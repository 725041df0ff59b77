//! Recognizer adapter: one OCR call per frame with monotone progress.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use snapsage_core::{EngineProgress, FrameBuffer, OcrEngine, RecognitionError, RecognitionResult};
use tracing::{debug, info, warn};

/// The only language profile the pipeline loads.
pub const LANGUAGE: &str = "eng";

/// Engine status tag whose progress is forwarded to callers. Other phases
/// (loading models, initializing) are not part of recognition progress.
pub const RECOGNIZING_TEXT: &str = "recognizing text";

pub struct RecognizerAdapter {
    engine: Arc<dyn OcrEngine>,
}

impl RecognizerAdapter {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Recognize text in `frame`, reporting integer percentages to `on_progress`.
    ///
    /// Reported values strictly increase within one call, stay within 0..=100,
    /// and end at 100 when text was found. Whitespace-only output is a success
    /// with empty text. Engine failures are returned as-is, never retried.
    pub async fn recognize(
        &self,
        frame: &FrameBuffer,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<RecognitionResult, RecognitionError> {
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.width == 0 || frame.height == 0 || frame.data.len() != expected {
            return Err(RecognitionError::InvalidInput(format!(
                "{frame:?} does not hold {expected} RGBA bytes"
            )));
        }

        let tracker = ProgressTracker::new(on_progress);
        let forward = |p: EngineProgress| {
            if p.status == RECOGNIZING_TEXT {
                tracker.report(to_percent(p.progress));
            } else {
                debug!(engine = self.engine.name(), status = %p.status, "OCR engine status");
            }
        };

        let started = Instant::now();
        let output = match self.engine.recognize(frame, LANGUAGE, &forward).await {
            Ok(output) => output,
            Err(e) => {
                warn!(engine = self.engine.name(), error = %e, "Text recognition failed");
                return Err(e);
            }
        };

        let text = output.text.trim().to_string();
        let confidence_percent = output.confidence.clamp(0.0, 100.0).round() as u8;
        if !text.is_empty() {
            tracker.report(100);
        }

        info!(
            engine = self.engine.name(),
            chars = text.chars().count(),
            confidence = confidence_percent,
            latency_ms = started.elapsed().as_millis() as u64,
            "Text recognized"
        );
        Ok(RecognitionResult {
            text,
            confidence_percent,
        })
    }
}

fn to_percent(fraction: f32) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Drops any value not strictly above the last one reported.
struct ProgressTracker<'a> {
    last: Mutex<Option<u8>>,
    sink: &'a (dyn Fn(u8) + Send + Sync),
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: &'a (dyn Fn(u8) + Send + Sync)) -> Self {
        Self {
            last: Mutex::new(None),
            sink,
        }
    }

    fn report(&self, percent: u8) {
        let Ok(mut last) = self.last.lock() else { return };
        if last.is_some_and(|l| percent <= l) {
            return;
        }
        *last = Some(percent);
        (self.sink)(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snapsage_core::EngineOutput;

    /// Replays a fixed list of progress notifications, then returns `result`.
    struct ScriptedEngine {
        progress: Vec<(&'static str, f32)>,
        result: Result<EngineOutput, RecognitionError>,
        seen_language: Mutex<Option<String>>,
    }

    impl ScriptedEngine {
        fn new(progress: Vec<(&'static str, f32)>, text: &str, confidence: f32) -> Self {
            Self {
                progress,
                result: Ok(EngineOutput {
                    text: text.to_string(),
                    confidence,
                }),
                seen_language: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                progress: vec![(RECOGNIZING_TEXT, 0.3)],
                result: Err(RecognitionError::Engine("worker crashed".into())),
                seen_language: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn recognize(
            &self,
            _frame: &FrameBuffer,
            language: &str,
            on_progress: &(dyn Fn(EngineProgress) + Send + Sync),
        ) -> Result<EngineOutput, RecognitionError> {
            *self.seen_language.lock().unwrap() = Some(language.to_string());
            for (status, p) in &self.progress {
                on_progress(EngineProgress::new(*status, *p));
            }
            self.result.clone()
        }
    }

    fn frame() -> FrameBuffer {
        FrameBuffer::new(300, 200, vec![255; 300 * 200 * 4])
    }

    async fn run(engine: ScriptedEngine) -> (Result<RecognitionResult, RecognitionError>, Vec<u8>) {
        let seen = Mutex::new(Vec::new());
        let adapter = RecognizerAdapter::new(Arc::new(engine));
        let result = adapter
            .recognize(&frame(), &|p| seen.lock().unwrap().push(p))
            .await;
        (result, seen.into_inner().unwrap())
    }

    #[tokio::test]
    async fn test_hello_world_ends_at_100() {
        let engine = ScriptedEngine::new(
            vec![
                ("loading language traineddata", 0.5),
                (RECOGNIZING_TEXT, 0.0),
                (RECOGNIZING_TEXT, 0.42),
                (RECOGNIZING_TEXT, 0.9),
            ],
            "Hello World\n",
            91.4,
        );
        let (result, progress) = run(engine).await;
        let result = result.unwrap();
        assert_eq!(result.text, "Hello World");
        assert_eq!(result.confidence_percent, 91);
        assert_eq!(progress, vec![0, 42, 90, 100]);
    }

    #[tokio::test]
    async fn test_progress_is_monotone_and_bounded() {
        let engine = ScriptedEngine::new(
            vec![
                (RECOGNIZING_TEXT, 0.5),
                (RECOGNIZING_TEXT, 0.2),
                (RECOGNIZING_TEXT, 0.5),
                (RECOGNIZING_TEXT, 1.7),
                (RECOGNIZING_TEXT, -0.3),
                (RECOGNIZING_TEXT, f32::NAN),
            ],
            "text",
            50.0,
        );
        let (_, progress) = run(engine).await;
        assert_eq!(progress, vec![50, 100]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(progress.iter().all(|p| *p <= 100));
    }

    #[tokio::test]
    async fn test_blank_text_is_success() {
        let engine = ScriptedEngine::new(vec![(RECOGNIZING_TEXT, 0.6)], "  \n\t ", 0.0);
        let (result, progress) = run(engine).await;
        let result = result.unwrap();
        assert_eq!(result.text, "");
        assert!(result.is_blank());
        assert_eq!(progress, vec![60]);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let (result, progress) = run(ScriptedEngine::failing()).await;
        assert!(matches!(result, Err(RecognitionError::Engine(_))));
        assert_eq!(progress, vec![30]);
    }

    #[tokio::test]
    async fn test_uses_english_profile() {
        let engine = Arc::new(ScriptedEngine::new(vec![], "x", 10.0));
        let adapter = RecognizerAdapter::new(engine.clone());
        adapter.recognize(&frame(), &|_| {}).await.unwrap();
        assert_eq!(engine.seen_language.lock().unwrap().as_deref(), Some("eng"));
    }

    #[tokio::test]
    async fn test_rejects_malformed_frame() {
        let adapter = RecognizerAdapter::new(Arc::new(ScriptedEngine::new(vec![], "x", 0.0)));
        let bad = FrameBuffer::new(300, 200, vec![0; 12]);
        let err = adapter.recognize(&bad, &|_| {}).await.unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidInput(_)));
    }
}
