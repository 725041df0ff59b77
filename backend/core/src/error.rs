use thiserror::Error;

use crate::types::{DeviceHint, PipelinePhase};

/// Shown to the user when no camera could be opened.
pub const ACQUISITION_GUIDANCE: &str = "Unable to access the camera. Please check that: \
camera permissions are granted for this application; \
the page or host is served from a secure context (HTTPS or localhost); \
no other application is currently using the camera; \
then refresh and try again.";

/// Why a single media-device open attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no matching device: {0}")]
    NotFound(String),

    #[error("device busy: {0}")]
    Busy(String),

    #[error("insecure context: {0}")]
    InsecureContext(String),

    #[error("device error: {0}")]
    Other(String),
}

/// Every constraint in the preference order was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("camera acquisition failed after {} attempt(s): {guidance}", attempts.len())]
pub struct AcquisitionError {
    pub attempts: Vec<(DeviceHint, DeviceError)>,
    pub guidance: String,
}

impl AcquisitionError {
    pub fn new(attempts: Vec<(DeviceHint, DeviceError)>) -> Self {
        Self {
            attempts,
            guidance: ACQUISITION_GUIDANCE.to_string(),
        }
    }

    /// The error reported for the last constraint tried.
    pub fn last_cause(&self) -> Option<&DeviceError> {
        self.attempts.last().map(|(_, e)| e)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no capture source available")]
    NoSource,

    #[error("capture source is not active")]
    Inactive,

    #[error("capture source has not produced a frame yet")]
    NoFrame,

    #[error("malformed frame: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("invalid recognition input: {0}")]
    InvalidInput(String),

    #[error("recognition engine failed: {0}")]
    Engine(String),
}

/// Errors from an upstream language-model provider, as seen by the relay.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limit exceeded ({provider}): {message}")]
    RateLimited { provider: String, message: String },

    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned an unreadable response: {message}")]
    Malformed { provider: String, message: String },
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// A trigger arrived while the controller was not ready for one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("trigger rejected while {phase}")]
pub struct TriggerRejected {
    pub phase: PipelinePhase,
}
