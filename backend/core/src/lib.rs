pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::{
    AcquisitionError, CaptureError, DeviceError, ProviderError, RecognitionError, TriggerRejected,
    ACQUISITION_GUIDANCE,
};
pub use event::{EventKind, PipelineEvent};
pub use traits::{
    Dispatcher, EngineOutput, EngineProgress, LlmProvider, LlmRequest, LlmResponse, MediaDevices,
    OcrEngine, VideoStream,
};
pub use types::{
    CaptureSource, DeviceHint, DispatchOutcome, FrameBuffer, PipelinePhase, QuotaAlert, RawFrame,
    RecognitionResult,
};
