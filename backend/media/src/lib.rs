//! Camera side of the pipeline: acquiring a source, snapshotting frames,
//! and the concrete device backends.

pub mod acquire;
pub mod capture;
pub mod mime_detect;
pub mod still;
#[cfg(target_os = "linux")]
pub mod v4l2;

pub use acquire::DeviceAcquirer;
pub use capture::{FrameCapturer, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
pub use mime_detect::{detect_mime_type, is_image};
pub use still::{StillImageDevices, StillImageStream};
#[cfg(target_os = "linux")]
pub use v4l2::{list_video_nodes, V4l2Devices, V4l2Stream};
