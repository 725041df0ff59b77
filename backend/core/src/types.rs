use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::traits::VideoStream;

/// Which camera a capture source was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceHint {
    /// Rear-facing camera (`facingMode: environment`).
    Rear,
    /// Front-facing camera (`facingMode: user`).
    Front,
    /// Any available video device, unconstrained.
    Any,
}

impl DeviceHint {
    /// Order in which the acquirer tries constraints.
    pub const PREFERENCE_ORDER: [DeviceHint; 3] = [DeviceHint::Rear, DeviceHint::Front, DeviceHint::Any];

    /// The facing-mode constraint sent to the media device boundary.
    /// `None` means no facing constraint at all.
    pub fn facing_mode(&self) -> Option<&'static str> {
        match self {
            DeviceHint::Rear => Some("environment"),
            DeviceHint::Front => Some("user"),
            DeviceHint::Any => None,
        }
    }
}

impl fmt::Display for DeviceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceHint::Rear => write!(f, "rear"),
            DeviceHint::Front => write!(f, "front"),
            DeviceHint::Any => write!(f, "any"),
        }
    }
}

/// A decoded frame as a device presents it: tightly packed RGBA8.
#[derive(Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
        }
    }

    /// Number of bytes a well-formed RGBA frame of these dimensions occupies.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame({}x{}, {} bytes)", self.width, self.height, self.data.len())
    }
}

/// Handle to a live video feed.
///
/// Cloning shares the underlying stream; the stream is released when the last
/// clone is dropped.
#[derive(Clone)]
pub struct CaptureSource {
    hint: DeviceHint,
    label: String,
    stream: Arc<dyn VideoStream>,
}

impl CaptureSource {
    pub fn new(hint: DeviceHint, label: impl Into<String>, stream: Arc<dyn VideoStream>) -> Self {
        Self {
            hint,
            label: label.into(),
            stream,
        }
    }

    pub fn device_hint(&self) -> DeviceHint {
        self.hint
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_live()
    }

    /// The frame currently on display, if the stream has produced one.
    pub fn current_frame(&self) -> Option<RawFrame> {
        self.stream.current_frame()
    }
}

impl fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSource")
            .field("hint", &self.hint)
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Fixed-size RGBA snapshot handed from the capturer to the recognizer.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameBuffer({}x{}, {} bytes)", self.width, self.height, self.data.len())
    }
}

/// Text recognized in one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub confidence_percent: u8,
}

impl RecognitionResult {
    /// True when nothing legible was found. This is a valid result, not a failure.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Classified reply from the reasoning endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Answer(String),
    QuotaExceeded,
    TransportError(String),
    EmptyUpstreamReply,
}

impl DispatchOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchOutcome::Answer(_) => "answer",
            DispatchOutcome::QuotaExceeded => "quota_exceeded",
            DispatchOutcome::TransportError(_) => "transport_error",
            DispatchOutcome::EmptyUpstreamReply => "empty_upstream_reply",
        }
    }
}

/// The controller's single source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "detail", rename_all = "snake_case")]
pub enum PipelinePhase {
    Initializing,
    Streaming,
    Capturing,
    Recognizing(u8),
    Dispatching,
    Displaying(String),
    Faulted(String),
}

impl PipelinePhase {
    /// Whether a user trigger may start a new capture cycle from this phase.
    pub fn accepts_trigger(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Streaming | PipelinePhase::Displaying(_) | PipelinePhase::Faulted(_)
        )
    }

    /// True while a capture cycle is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Capturing | PipelinePhase::Recognizing(_) | PipelinePhase::Dispatching
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelinePhase::Initializing => "initializing",
            PipelinePhase::Streaming => "streaming",
            PipelinePhase::Capturing => "capturing",
            PipelinePhase::Recognizing(_) => "recognizing",
            PipelinePhase::Dispatching => "dispatching",
            PipelinePhase::Displaying(_) => "displaying",
            PipelinePhase::Faulted(_) => "faulted",
        }
    }
}

impl Default for PipelinePhase {
    fn default() -> Self {
        Self::Initializing
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelinePhase::Recognizing(p) => write!(f, "recognizing ({p}%)"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// The alert raised when the reasoning service reports an exhausted quota.
/// Lives outside [`PipelinePhase`]; the user dismisses it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaAlert {
    pub title: String,
    pub message: String,
}

impl Default for QuotaAlert {
    fn default() -> Self {
        Self {
            title: "API Limit Reached".to_string(),
            message: "The reasoning service quota is exhausted. Please try again later."
                .to_string(),
        }
    }
}
