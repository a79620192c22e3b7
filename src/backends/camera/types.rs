// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera sources

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Bus the device hangs off (e.g. `usb-0000:00:14.0-1`)
    pub bus: String,
}

/// Represents a camera device
#[derive(Debug, Clone)]
pub struct CameraDevice {
    pub name: String,
    pub path: String, // Capture device node, e.g. /dev/video0
    pub device_info: Option<DeviceInfo>,
}

/// Framerate as a fraction (numerator/denominator)
/// Stores exact framerate to handle NTSC rates like 59.94fps (60000/1001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from a V4L2 frame interval (seconds per frame)
    pub fn from_interval(numerator: u32, denominator: u32) -> Self {
        Self::new(denominator, numerator)
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Get the rounded-down integer framerate
    pub fn as_int(&self) -> u32 {
        self.num / self.denom
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show decimal for non-integer framerates (NTSC)
        if self.denom != 1 && self.num % self.denom != 0 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.as_int())
        }
    }
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>,
    pub pixel_format: String, // FourCC code (e.g., "MJPG", "YUYV")
}

impl CameraFormat {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(
                f,
                "{}x{} @ {}fps ({})",
                self.width, self.height, fps, self.pixel_format
            )
        } else {
            write!(f, "{}x{} ({})", self.width, self.height, self.pixel_format)
        }
    }
}

/// What the session asks of a camera source
///
/// The preferred resolution is a hint: sources fall back to their own default
/// format and report what they actually deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConstraints {
    pub preferred: Resolution,
    /// Specific device to open; the first capture device when `None`
    pub device_path: Option<String>,
}

impl Default for SourceConstraints {
    fn default() -> Self {
        Self {
            preferred: Resolution::new(
                crate::constants::resolution::PREFERRED_WIDTH,
                crate::constants::resolution::PREFERRED_HEIGHT,
            ),
            device_path: None,
        }
    }
}

/// Pixel format of camera frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel), the canonical format
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
    /// Motion JPEG - each frame is a complete JPEG image
    MJPEG,
}

impl PixelFormat {
    /// Map a V4L2 FourCC to a supported format
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::YUYV),
            b"UYVY" => Some(Self::UYVY),
            b"MJPG" | b"JPEG" => Some(Self::MJPEG),
            b"RGB3" => Some(Self::RGB24),
            b"AB24" | b"RGBA" => Some(Self::RGBA),
            b"GREY" => Some(Self::Gray8),
            _ => None,
        }
    }

    /// Bytes per pixel in a packed row; `None` for compressed formats
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            Self::RGBA => Some(4),
            Self::RGB24 => Some(3),
            Self::YUYV | Self::UYVY => Some(2),
            Self::Gray8 => Some(1),
            Self::MJPEG => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Raw frame bytes in `format`
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride for packed formats (bytes per row, may include padding)
    pub stride: u32,
    /// Monotonic per-feed frame counter
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap tightly packed RGBA pixels
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: Arc::from(rgba.into_boxed_slice()),
            format: PixelFormat::RGBA,
            stride: width * 4,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Result type for camera source operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Camera source errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The user or the system refused access to the device
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Camera device not found
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    /// Another process holds the device
    #[error("device busy: {0}")]
    Busy(String),
    /// No usable format could be negotiated
    #[error("format not supported: {0}")]
    FormatNotSupported(String),
    /// The stream ended underneath us
    #[error("device disconnected: {0}")]
    Disconnected(String),
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl BackendError {
    /// Classify an OS error raised while opening or streaming `path`
    pub fn from_io(path: &str, err: &std::io::Error) -> Self {
        const EBUSY: i32 = 16;
        const ENODEV: i32 = 19;

        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(path.into()),
            std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(path.into()),
            _ => match err.raw_os_error() {
                Some(EBUSY) => BackendError::Busy(path.into()),
                Some(ENODEV) => BackendError::Disconnected(path.into()),
                _ => BackendError::Io(format!("{}: {}", path, err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framerate_display() {
        assert_eq!(Framerate::from_interval(1, 30).to_string(), "30");
        assert_eq!(Framerate::new(60000, 1001).to_string(), "59.94");
        assert_eq!(Framerate::new(30, 0).denom, 1);
    }

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::YUYV));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), Some(PixelFormat::MJPEG));
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
        assert_eq!(PixelFormat::MJPEG.bytes_per_pixel(), None);
    }

    #[test]
    fn test_io_error_classification() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(
            BackendError::from_io("/dev/video0", &denied),
            BackendError::PermissionDenied("/dev/video0".into())
        );

        let busy = std::io::Error::from_raw_os_error(16);
        assert_eq!(
            BackendError::from_io("/dev/video0", &busy),
            BackendError::Busy("/dev/video0".into())
        );
    }
}
