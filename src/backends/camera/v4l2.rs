// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera source
//!
//! Opens a capture node directly through the `v4l` crate, negotiates the
//! closest format to the requested resolution and streams mmap buffers from a
//! dedicated thread into the feed's latest-frame channel.

use super::types::*;
use super::{CameraSource, FramePublisher, LiveFeed, StreamHandle};
use crate::constants::resolution::V4L2_BUFFERS;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

const DEFAULT_DEVICE: &str = "/dev/video0";

/// Formats requested in order of preference at the negotiated size
const PREFERRED_FOURCCS: [&[u8; 4]; 2] = [b"YUYV", b"MJPG"];

/// Consecutive dequeue failures tolerated before the device counts as lost
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// How long a single dequeue may block before the stop flag is re-checked
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Camera attached through Video4Linux2
#[derive(Debug, Default)]
pub struct V4l2Source {
    device_path: Option<String>,
}

impl V4l2Source {
    /// Source for a specific node, or the first capture device when `None`
    pub fn new(device_path: Option<String>) -> Self {
        Self { device_path }
    }

    fn resolve_path(&self, constraints: &SourceConstraints) -> String {
        self.device_path
            .clone()
            .or_else(|| constraints.device_path.clone())
            .or_else(|| enumerate_cameras().into_iter().next().map(|c| c.path))
            .unwrap_or_else(|| DEFAULT_DEVICE.to_string())
    }
}

impl CameraSource for V4l2Source {
    fn name(&self) -> String {
        match &self.device_path {
            Some(path) => format!("V4L2 {}", path),
            None => "V4L2".to_string(),
        }
    }

    async fn acquire(&mut self, constraints: &SourceConstraints) -> BackendResult<LiveFeed> {
        let path = self.resolve_path(constraints);
        let preferred = constraints.preferred;

        let (tx, rx) = watch::channel(None);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let thread_path = path.clone();
        let thread_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name("v4l2-capture".into())
            .spawn(move || capture_loop(thread_path, preferred, thread_stop, tx, ready_tx))
            .map_err(|e| BackendError::Io(format!("failed to spawn capture thread: {}", e)))?;

        let negotiated = match ready_rx.await {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(BackendError::Io(format!(
                    "{}: capture thread exited during setup",
                    path
                )));
            }
        };

        info!(
            path = %path,
            requested = %preferred,
            actual = %negotiated,
            "V4L2 stream started"
        );

        Ok(LiveFeed::new(
            path,
            negotiated.resolution(),
            rx,
            Box::new(V4l2Stream {
                stop,
                thread: Some(handle),
            }),
        ))
    }
}

struct V4l2Stream {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StreamHandle for V4l2Stream {
    /// Signal the capture thread and reap it off the async thread
    ///
    /// The thread notices the flag after at most one [`DEQUEUE_TIMEOUT`];
    /// inside a runtime that wait happens on the blocking pool so the UI
    /// keeps drawing.
    fn stop(mut self: Box<Self>) {
        self.stop.store(true, Ordering::SeqCst);
        let Some(thread) = self.thread.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || join_capture_thread(thread));
            }
            Err(_) => join_capture_thread(thread),
        }
    }
}

fn join_capture_thread(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        error!("V4L2 capture thread panicked");
    }
}

/// Pick a format at the preferred size, falling back to the device default
fn negotiate_format(dev: &Device, preferred: Resolution) -> std::io::Result<Format> {
    for fourcc in PREFERRED_FOURCCS {
        let request = Format::new(preferred.width, preferred.height, FourCC::new(fourcc));
        match dev.set_format(&request) {
            Ok(actual) if PixelFormat::from_fourcc(&actual.fourcc.repr).is_some() => {
                return Ok(actual);
            }
            Ok(actual) => {
                debug!(fourcc = ?actual.fourcc, "Driver substituted an unusable format");
            }
            Err(e) => {
                debug!(fourcc = ?FourCC::new(fourcc), error = %e, "Format rejected");
            }
        }
    }
    dev.format()
}

fn capture_loop(
    path: String,
    preferred: Resolution,
    stop: Arc<AtomicBool>,
    frames: FramePublisher,
    ready: tokio::sync::oneshot::Sender<BackendResult<CameraFormat>>,
) {
    let dev = match Device::with_path(&path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(BackendError::from_io(&path, &e)));
            return;
        }
    };

    let format = match negotiate_format(&dev, preferred) {
        Ok(format) => format,
        Err(e) => {
            let _ = ready.send(Err(BackendError::from_io(&path, &e)));
            return;
        }
    };

    let Some(pixel_format) = PixelFormat::from_fourcc(&format.fourcc.repr) else {
        let _ = ready.send(Err(BackendError::FormatNotSupported(format!(
            "{}: {:?}",
            path, format.fourcc
        ))));
        return;
    };

    let mut stream = match Stream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFERS) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(BackendError::from_io(&path, &e)));
            return;
        }
    };
    stream.set_timeout(DEQUEUE_TIMEOUT);

    let negotiated = CameraFormat {
        width: format.width,
        height: format.height,
        framerate: None,
        pixel_format: format!("{:?}", format.fourcc),
    };
    if ready.send(Ok(negotiated)).is_err() {
        return;
    }

    let stride = if format.stride > 0 {
        format.stride
    } else {
        format.width * pixel_format.bytes_per_pixel().unwrap_or(0)
    };

    let mut sequence = 0u64;
    let mut consecutive_errors = 0u32;

    while !stop.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(frame) => frame,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if matches!(BackendError::from_io(&path, &e), BackendError::Disconnected(_)) => {
                warn!(path = %path, "Camera unplugged");
                break;
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(path = %path, error = %e, consecutive_errors, "Failed to dequeue frame");
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!(path = %path, "Too many capture errors, giving up");
                    break;
                }
                continue;
            }
        };
        consecutive_errors = 0;

        let used = (meta.bytesused as usize).min(buf.len());
        let used = if used == 0 { buf.len() } else { used };

        sequence += 1;
        let frame = CameraFrame {
            width: format.width,
            height: format.height,
            data: Arc::from(&buf[..used]),
            format: pixel_format,
            stride,
            sequence,
            captured_at: Instant::now(),
        };

        if frames.send(Some(Arc::new(frame))).is_err() {
            debug!("No feed listening, stopping capture");
            break;
        }
    }

    info!(path = %path, frames = sequence, "V4L2 capture loop stopped");
    // dropping `frames` here closes the feed
}

/// List V4L2 nodes that can capture video
pub fn enumerate_cameras() -> Vec<CameraDevice> {
    let mut cameras = Vec::new();

    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();
        let Ok(dev) = Device::with_path(node.path()) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }
        // metadata-only nodes share the card name but list no formats
        if dev.enum_formats().map(|f| f.is_empty()).unwrap_or(true) {
            continue;
        }

        debug!(path = %path, card = %caps.card, "Found capture device");
        cameras.push(CameraDevice {
            name: caps.card.clone(),
            path,
            device_info: Some(DeviceInfo {
                card: caps.card,
                driver: caps.driver,
                bus: caps.bus,
            }),
        });
    }

    cameras.sort_by(|a, b| a.path.cmp(&b.path));
    cameras
}

/// Formats a capture node advertises
pub fn get_formats(path: &str) -> Vec<CameraFormat> {
    let Ok(dev) = Device::with_path(path) else {
        return Vec::new();
    };

    let mut formats = Vec::new();
    for desc in dev.enum_formats().into_iter().flatten() {
        let fourcc = format!("{:?}", desc.fourcc);
        for size in dev.enum_framesizes(desc.fourcc).into_iter().flatten() {
            let v4l::framesize::FrameSizeEnum::Discrete(discrete) = size.size else {
                continue;
            };
            let intervals = dev
                .enum_frameintervals(desc.fourcc, discrete.width, discrete.height)
                .unwrap_or_default();
            if intervals.is_empty() {
                formats.push(CameraFormat {
                    width: discrete.width,
                    height: discrete.height,
                    framerate: None,
                    pixel_format: fourcc.clone(),
                });
            }
            for interval in intervals {
                let framerate = match interval.interval {
                    v4l::frameinterval::FrameIntervalEnum::Discrete(frac)
                        if frac.numerator > 0 =>
                    {
                        Some(Framerate::from_interval(frac.numerator, frac.denominator))
                    }
                    _ => None,
                };
                formats.push(CameraFormat {
                    width: discrete.width,
                    height: discrete.height,
                    framerate,
                    pixel_format: fourcc.clone(),
                });
            }
        }
    }
    formats
}
