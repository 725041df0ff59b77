use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record of something the pipeline did. Published on the controller's
/// event channel and written to the structured log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub id: Uuid,
    /// The capture cycle this event belongs to; `None` for startup events.
    pub cycle_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A camera stream was opened
    SourceAcquired,
    /// Every camera constraint was refused
    AcquisitionFailed,
    /// A trigger started a capture cycle
    TriggerAccepted,
    /// A trigger arrived while busy or initializing
    TriggerRejected,
    /// A frame was snapshotted
    FrameCaptured,
    CaptureFailed,
    TextRecognized,
    RecognitionFailed,
    /// The reasoning service replied (any outcome)
    DispatchCompleted,
    QuotaAlertRaised,
}

impl PipelineEvent {
    pub fn new(cycle_id: Option<Uuid>, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_id,
            timestamp: Utc::now(),
            kind,
            payload,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}
