pub mod controller;

pub use controller::{
    CycleReport, PipelineController, CYCLE_ABANDONED_MESSAGE, EMPTY_REPLY_MESSAGE, NO_TEXT_DETECTED,
    RECOGNITION_FAILED_MESSAGE, TRANSPORT_ERROR_MESSAGE,
};
