//! The pipeline controller owns the phase state machine and runs one
//! capture → recognize → dispatch cycle per accepted trigger.
//!
//! Phase and quota alert live in `watch` channels so any number of
//! renderers can follow them; every transition is also published as a
//! [`PipelineEvent`] on a broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use snapsage_core::{
    CaptureError, CaptureSource, DispatchOutcome, Dispatcher, EventKind, PipelineEvent,
    PipelinePhase, QuotaAlert, TriggerRejected,
};
use snapsage_media::{DeviceAcquirer, FrameCapturer};
use snapsage_understanding::RecognizerAdapter;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const NO_TEXT_DETECTED: &str = "no text detected";
pub const TRANSPORT_ERROR_MESSAGE: &str =
    "Unable to connect to the reasoning service. Please check that the backend is running.";
pub const EMPTY_REPLY_MESSAGE: &str = "No reply received from the reasoning service.";
pub const RECOGNITION_FAILED_MESSAGE: &str = "Text recognition failed. Please try again.";
pub const CYCLE_ABANDONED_MESSAGE: &str = "Capture cycle was cancelled. Please try again.";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Faults the phase if an accepted cycle is dropped before it settles,
/// so a cancelled `trigger` future cannot leave the controller busy.
struct CycleGuard<'a> {
    phase_tx: &'a watch::Sender<PipelinePhase>,
    cycle_id: Uuid,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self, phase: PipelinePhase) {
        self.phase_tx.send_replace(phase);
        self.settled = true;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(cycle_id = %self.cycle_id, "Capture cycle abandoned");
            self.phase_tx
                .send_replace(PipelinePhase::Faulted(CYCLE_ABANDONED_MESSAGE.to_string()));
        }
    }
}

/// What one accepted trigger produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Phase the cycle settled in.
    pub phase: PipelinePhase,
    /// Present only when text was dispatched.
    pub dispatch: Option<DispatchOutcome>,
}

pub struct PipelineController {
    acquirer: DeviceAcquirer,
    capturer: FrameCapturer,
    recognizer: RecognizerAdapter,
    dispatcher: Arc<dyn Dispatcher>,
    source: OnceLock<CaptureSource>,
    started: AtomicBool,
    phase_tx: watch::Sender<PipelinePhase>,
    alert_tx: watch::Sender<Option<QuotaAlert>>,
    events_tx: broadcast::Sender<PipelineEvent>,
}

impl PipelineController {
    pub fn new(
        acquirer: DeviceAcquirer,
        capturer: FrameCapturer,
        recognizer: RecognizerAdapter,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(PipelinePhase::Initializing);
        let (alert_tx, _) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            acquirer,
            capturer,
            recognizer,
            dispatcher,
            source: OnceLock::new(),
            started: AtomicBool::new(false),
            phase_tx,
            alert_tx,
            events_tx,
        }
    }

    /// Acquire the camera. Runs at most once per controller; later calls
    /// return the current phase without touching the devices again.
    pub async fn start(&self) -> PipelinePhase {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Pipeline already started");
            return self.phase();
        }

        match self.acquirer.acquire().await {
            Ok(source) => {
                let payload = serde_json::json!({
                    "hint": source.device_hint(),
                    "label": source.label(),
                });
                // `started` guarantees this is the only writer.
                let _ = self.source.set(source);
                self.phase_tx.send_replace(PipelinePhase::Streaming);
                self.emit(None, EventKind::SourceAcquired, payload);
                info!(
                    backend = self.acquirer.backend(),
                    engine = self.recognizer.engine_name(),
                    "Pipeline streaming"
                );
            }
            Err(e) => {
                let attempts: Vec<_> = e
                    .attempts
                    .iter()
                    .map(|(hint, err)| serde_json::json!({"hint": hint, "error": err.to_string()}))
                    .collect();
                self.phase_tx.send_replace(PipelinePhase::Faulted(e.guidance.clone()));
                self.emit(None, EventKind::AcquisitionFailed, serde_json::json!({ "attempts": attempts }));
            }
        }
        self.phase()
    }

    /// Run one capture cycle if the current phase allows it.
    ///
    /// The phase check and the move to `Capturing` happen atomically, so of
    /// two concurrent triggers exactly one is accepted.
    pub async fn trigger(&self) -> Result<CycleReport, TriggerRejected> {
        let mut rejected = None;
        let accepted = self.phase_tx.send_if_modified(|phase| {
            if phase.accepts_trigger() {
                *phase = PipelinePhase::Capturing;
                true
            } else {
                rejected = Some(phase.clone());
                false
            }
        });

        if !accepted {
            let phase = rejected.unwrap_or_else(|| self.phase());
            debug!(phase = %phase, "Trigger rejected");
            self.emit(None, EventKind::TriggerRejected, serde_json::json!({ "phase": phase.name() }));
            return Err(TriggerRejected { phase });
        }

        let cycle_id = Uuid::new_v4();
        let guard = CycleGuard {
            phase_tx: &self.phase_tx,
            cycle_id,
            settled: false,
        };
        self.emit(Some(cycle_id), EventKind::TriggerAccepted, serde_json::Value::Null);
        let (phase, dispatch) = self.run_cycle(cycle_id).await;
        guard.settle(phase.clone());
        info!(cycle_id = %cycle_id, phase = %phase, "Cycle finished");

        Ok(CycleReport {
            cycle_id,
            phase,
            dispatch,
        })
    }

    async fn run_cycle(&self, cycle_id: Uuid) -> (PipelinePhase, Option<DispatchOutcome>) {
        let frame = match self
            .source
            .get()
            .ok_or(CaptureError::NoSource)
            .and_then(|source| self.capturer.capture(source))
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!(cycle_id = %cycle_id, error = %e, "Frame capture failed");
                self.emit(Some(cycle_id), EventKind::CaptureFailed, serde_json::json!({ "error": e.to_string() }));
                return (PipelinePhase::Faulted(format!("Frame capture failed: {e}")), None);
            }
        };
        self.emit(
            Some(cycle_id),
            EventKind::FrameCaptured,
            serde_json::json!({ "width": frame.width, "height": frame.height }),
        );

        self.phase_tx.send_replace(PipelinePhase::Recognizing(0));
        let on_progress = |percent: u8| {
            self.phase_tx.send_if_modified(|phase| match phase {
                PipelinePhase::Recognizing(current) if percent > *current => {
                    *current = percent;
                    true
                }
                _ => false,
            });
        };

        let recognition = match self.recognizer.recognize(&frame, &on_progress).await {
            Ok(result) => result,
            Err(e) => {
                self.emit(Some(cycle_id), EventKind::RecognitionFailed, serde_json::json!({ "error": e.to_string() }));
                return (PipelinePhase::Faulted(RECOGNITION_FAILED_MESSAGE.to_string()), None);
            }
        };
        self.emit(
            Some(cycle_id),
            EventKind::TextRecognized,
            serde_json::json!({
                "chars": recognition.text.chars().count(),
                "confidence": recognition.confidence_percent,
            }),
        );

        if recognition.is_blank() {
            return (PipelinePhase::Displaying(NO_TEXT_DETECTED.to_string()), None);
        }

        self.phase_tx.send_replace(PipelinePhase::Dispatching);
        let outcome = self.dispatcher.dispatch(&recognition.text).await;
        let detail = match &outcome {
            DispatchOutcome::TransportError(detail) => serde_json::json!(detail),
            _ => serde_json::Value::Null,
        };
        self.emit(
            Some(cycle_id),
            EventKind::DispatchCompleted,
            serde_json::json!({ "outcome": outcome.kind(), "detail": detail }),
        );

        let phase = match &outcome {
            DispatchOutcome::Answer(answer) => PipelinePhase::Displaying(answer.clone()),
            DispatchOutcome::QuotaExceeded => {
                let alert = QuotaAlert::default();
                warn!(cycle_id = %cycle_id, "Reasoning service quota exhausted");
                self.emit(Some(cycle_id), EventKind::QuotaAlertRaised, serde_json::json!({ "title": alert.title }));
                self.alert_tx.send_replace(Some(alert));
                PipelinePhase::Streaming
            }
            DispatchOutcome::TransportError(detail) => {
                error!(cycle_id = %cycle_id, detail = %detail, "Reasoning service unreachable");
                PipelinePhase::Displaying(TRANSPORT_ERROR_MESSAGE.to_string())
            }
            DispatchOutcome::EmptyUpstreamReply => {
                PipelinePhase::Displaying(EMPTY_REPLY_MESSAGE.to_string())
            }
        };
        (phase, Some(outcome))
    }

    fn emit(&self, cycle_id: Option<Uuid>, kind: EventKind, payload: serde_json::Value) {
        // No subscribers is fine.
        let _ = self.events_tx.send(PipelineEvent::new(cycle_id, kind, payload));
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase_tx.borrow().clone()
    }

    /// True while an accepted cycle has not settled yet.
    pub fn is_busy(&self) -> bool {
        self.phase_tx.borrow().is_busy()
    }

    /// Name of the OCR engine behind the recognizer.
    pub fn engine_name(&self) -> &str {
        self.recognizer.engine_name()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<PipelinePhase> {
        self.phase_tx.subscribe()
    }

    /// True once a camera source is streaming.
    pub fn is_ready(&self) -> bool {
        self.source.get().is_some_and(CaptureSource::is_active)
    }

    pub fn quota_alert(&self) -> Option<QuotaAlert> {
        self.alert_tx.borrow().clone()
    }

    pub fn subscribe_quota_alert(&self) -> watch::Receiver<Option<QuotaAlert>> {
        self.alert_tx.subscribe()
    }

    /// Clear the quota alert. Returns whether one was showing.
    pub fn dismiss_quota_alert(&self) -> bool {
        self.alert_tx.send_if_modified(|alert| alert.take().is_some())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events_tx.subscribe()
    }
}
