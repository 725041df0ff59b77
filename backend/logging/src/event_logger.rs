//! Pipeline Event Logger
//!
//! Writes each [`PipelineEvent`] to the `pipeline_events` target so the JSON
//! file layer captures a per-cycle audit trail.

use chrono::{DateTime, Utc};
use serde::Serialize;
use snapsage_core::{EventKind, PipelineEvent};
use tracing::{info, warn};

use crate::redact::redact_sensitive_data;

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub cycle_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl From<&PipelineEvent> for EventLogEntry {
    fn from(event: &PipelineEvent) -> Self {
        Self {
            cycle_id: event.cycle_id.map(|id| id.to_string()),
            timestamp: event.timestamp,
            kind: event.kind.clone(),
            payload: redact_payload(&event.payload),
        }
    }
}

fn redact_payload(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(redact_sensitive_data(s)),
        serde_json::Value::Array(items) => items.iter().map(redact_payload).collect(),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_payload(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub struct EventLogger;

impl EventLogger {
    pub fn log_event(event: &PipelineEvent) {
        let entry = EventLogEntry::from(event);
        let payload = entry.payload.to_string();
        let cycle_id = entry.cycle_id.as_deref().unwrap_or("-");

        match entry.kind {
            EventKind::AcquisitionFailed
            | EventKind::CaptureFailed
            | EventKind::RecognitionFailed
            | EventKind::QuotaAlertRaised => {
                warn!(target: "pipeline_events", kind = %entry.kind, cycle_id, payload, "Pipeline event");
            }
            _ => {
                info!(target: "pipeline_events", kind = %entry.kind, cycle_id, payload, "Pipeline event");
            }
        }
    }
}
