//! Video4Linux2 cameras.
//!
//! The facing hints map to configured device nodes; the unconstrained attempt
//! takes the first `/dev/video*` node that opens. Each open stream owns a
//! capture thread that keeps the most recent decoded frame.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use async_trait::async_trait;
use snapsage_core::{DeviceError, DeviceHint, MediaDevices, RawFrame, VideoStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const BUFFER_COUNT: u32 = 4;

/// Linux `EBUSY`.
const EBUSY: i32 = 16;

#[derive(Debug, Clone, Default)]
pub struct V4l2Devices {
    environment: Option<PathBuf>,
    user: Option<PathBuf>,
    any: Option<PathBuf>,
}

impl V4l2Devices {
    pub fn new(environment: Option<PathBuf>, user: Option<PathBuf>, any: Option<PathBuf>) -> Self {
        Self {
            environment,
            user,
            any,
        }
    }

    fn candidates(&self, hint: DeviceHint) -> Vec<PathBuf> {
        match hint {
            DeviceHint::Rear => self.environment.iter().cloned().collect(),
            DeviceHint::Front => self.user.iter().cloned().collect(),
            DeviceHint::Any => match &self.any {
                Some(path) => vec![path.clone()],
                None => list_video_nodes(),
            },
        }
    }
}

/// `/dev/video*` nodes in numeric order.
pub fn list_video_nodes() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };
    let mut nodes: Vec<(u32, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let index = name.strip_prefix("video")?.parse().ok()?;
            Some((index, e.path()))
        })
        .collect();
    nodes.sort_by_key(|(index, _)| *index);
    nodes.into_iter().map(|(_, path)| path).collect()
}

#[async_trait]
impl MediaDevices for V4l2Devices {
    fn name(&self) -> &str {
        "v4l2"
    }

    async fn open(&self, hint: DeviceHint) -> Result<Arc<dyn VideoStream>, DeviceError> {
        let candidates = self.candidates(hint);
        if candidates.is_empty() {
            return Err(DeviceError::NotFound(format!("no video device configured for {hint}")));
        }

        let mut last_err = None;
        for path in candidates {
            match V4l2Stream::start(path.clone()).await {
                Ok(stream) => return Ok(Arc::new(stream)),
                Err(e) => {
                    debug!(device = %path.display(), error = %e, "Video node rejected");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| DeviceError::NotFound(hint.to_string())))
    }
}

fn map_io_error(path: &Path, e: io::Error) -> DeviceError {
    let what = format!("{}: {e}", path.display());
    match e.kind() {
        io::ErrorKind::NotFound => DeviceError::NotFound(what),
        io::ErrorKind::PermissionDenied => DeviceError::PermissionDenied(what),
        _ if e.raw_os_error() == Some(EBUSY) => DeviceError::Busy(what),
        _ => DeviceError::Other(what),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    Mjpg,
    Yuyv,
}

/// What the driver actually applied.
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    width: u32,
    height: u32,
    /// Bytes per row including driver padding.
    stride: u32,
    pixel_format: PixelFormat,
}

/// A running capture thread and the latest frame it produced.
pub struct V4l2Stream {
    device_path: PathBuf,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<RawFrame>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl V4l2Stream {
    /// Spawn the capture thread and wait until the device is streaming or has failed.
    pub async fn start(device_path: PathBuf) -> Result<Self, DeviceError> {
        let running = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_handle = {
            let path = device_path.clone();
            let running = running.clone();
            let latest = latest.clone();
            std::thread::Builder::new()
                .name("snapsage-v4l2".into())
                .spawn(move || capture_loop(&path, running, latest, ready_tx))
                .map_err(|e| DeviceError::Other(format!("failed to spawn capture thread: {e}")))?
        };

        let mut stream = Self {
            device_path,
            running,
            latest,
            thread_handle: Some(thread_handle),
        };

        match ready_rx.await {
            Ok(Ok(())) => Ok(stream),
            Ok(Err(e)) => {
                stream.stop();
                Err(e)
            }
            Err(_) => {
                stream.stop();
                Err(DeviceError::Other("capture thread exited before streaming".into()))
            }
        }
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!(device = %self.device_path.display(), "Capture thread panicked");
            }
        }
    }
}

impl VideoStream for V4l2Stream {
    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Option<RawFrame> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        info!(device = %self.device_path.display(), "Releasing camera");
        self.stop();
    }
}

fn capture_loop(
    path: &Path,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<RawFrame>>>,
    ready: oneshot::Sender<Result<(), DeviceError>>,
) {
    static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut dev = match Device::with_path(path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(map_io_error(path, e)));
            return;
        }
    };

    let negotiated = match negotiate_format(&mut dev) {
        Ok(negotiated) => negotiated,
        Err(e) => {
            let _ = ready.send(Err(e.map_or_else(|| map_other(path), |io| map_io_error(path, io))));
            return;
        }
    };

    let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, BUFFER_COUNT) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(map_io_error(path, e)));
            return;
        }
    };

    info!(
        device = %path.display(),
        width = negotiated.width,
        height = negotiated.height,
        stride = negotiated.stride,
        format = ?negotiated.pixel_format,
        "Camera streaming"
    );
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                let used = if used == 0 { buf.len() } else { used };
                let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
                match decode(&buf[..used], &negotiated) {
                    Some(frame) => {
                        if let Ok(mut slot) = latest.lock() {
                            *slot = Some(frame);
                        }
                    }
                    None => {
                        if frame_num % 30 == 0 {
                            warn!(device = %path.display(), bytes = used, "Undecodable frame dropped");
                        }
                    }
                }
            }
            Err(e) => {
                error!(device = %path.display(), error = %e, "Camera stream failed");
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    debug!(device = %path.display(), "Capture loop ended");
}

fn map_other(path: &Path) -> DeviceError {
    DeviceError::Other(format!("{}: no supported pixel format (MJPG or YUYV)", path.display()))
}

/// Ask for MJPG, fall back to YUYV. `Err(None)` means the device offered neither.
fn negotiate_format(dev: &mut Device) -> Result<Negotiated, Option<io::Error>> {
    for (fourcc, pixel_format) in [
        (FourCC::new(b"MJPG"), PixelFormat::Mjpg),
        (FourCC::new(b"YUYV"), PixelFormat::Yuyv),
    ] {
        let mut format = dev.format().map_err(Some)?;
        format.width = CAPTURE_WIDTH;
        format.height = CAPTURE_HEIGHT;
        format.fourcc = fourcc;
        match dev.set_format(&format) {
            Ok(applied) if applied.fourcc == fourcc => {
                return Ok(Negotiated {
                    width: applied.width,
                    height: applied.height,
                    stride: applied.stride,
                    pixel_format,
                });
            }
            Ok(applied) => {
                debug!(requested = ?fourcc, got = ?applied.fourcc, "Pixel format not accepted");
            }
            Err(e) => {
                debug!(requested = ?fourcc, error = %e, "Could not set pixel format");
            }
        }
    }
    Err(None)
}

fn decode(buf: &[u8], negotiated: &Negotiated) -> Option<RawFrame> {
    let Negotiated { width, height, stride, pixel_format } = *negotiated;
    match pixel_format {
        PixelFormat::Mjpg => {
            let img = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg).ok()?;
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            Some(RawFrame::new(w, h, rgba.into_raw()))
        }
        PixelFormat::Yuyv => {
            yuyv_to_rgba(buf, width, height, stride).map(|data| RawFrame::new(width, height, data))
        }
    }
}

/// Convert packed YUYV 4:2:2 to RGBA8 (BT.601, limited range).
///
/// `stride` is the driver's bytes-per-line; rows may carry trailing padding.
/// A stride shorter than one packed row is treated as unpadded.
pub fn yuyv_to_rgba(buf: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    let row_bytes = width as usize * 2;
    let stride = (stride as usize).max(row_bytes);
    let height = height as usize;
    if width % 2 != 0 || height == 0 {
        return None;
    }
    // The last row need not carry its padding.
    if buf.len() < stride * (height - 1) + row_bytes {
        return None;
    }

    let mut out = Vec::with_capacity(width as usize * height * 4);
    for row in 0..height {
        let start = row * stride;
        for chunk in buf[start..start + row_bytes].chunks_exact(4) {
            let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
            for y in [y0, y1] {
                let [r, g, b] = yuv_to_rgb(y, u, v);
                out.extend_from_slice(&[r, g, b, 255]);
            }
        }
    }
    Some(out)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}
