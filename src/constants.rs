// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Number of photos in one strip
pub const PHOTO_COUNT: usize = 3;

/// The single caption printed under the photos
pub const CAPTION: &str = "you are so pretty";

/// Fixed filename of the downloaded strip
pub const STRIP_FILENAME: &str = "photobooth-strip.png";

/// Default folder name (under the user's pictures directory) for downloads
pub const DEFAULT_SAVE_FOLDER: &str = "Photobooth";

/// Sequencing timing defaults
pub mod timing {
    use super::Duration;

    /// One countdown step
    pub const TICK: Duration = Duration::from_millis(1000);

    /// First value shown by the countdown
    pub const COUNTDOWN_FROM: u32 = 3;

    /// Pause between a capture and the next countdown
    pub const CAPTURE_PAUSE: Duration = Duration::from_millis(1000);

    /// "Get ready!" pause between acquiring the camera and the first countdown
    pub const WARMUP: Duration = Duration::from_millis(1000);

    /// Longest wait for the first live frame before the device counts as lost
    pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    /// How long the capture flash stays visible
    pub const FLASH_DURATION: Duration = Duration::from_millis(100);

    /// Fade-out after the flash peak
    pub const FLASH_FADE: Duration = Duration::from_millis(300);
}

/// Camera negotiation defaults
pub mod resolution {
    /// Requested width (HD); the device may deliver something else
    pub const PREFERRED_WIDTH: u32 = 1280;

    /// Requested height (HD)
    pub const PREFERRED_HEIGHT: u32 = 720;

    /// Number of mmap buffers queued on V4L2 devices
    pub const V4L2_BUFFERS: u32 = 4;
}

/// Strip layout and styling defaults
pub mod strip {
    /// Column width of every photo
    pub const PHOTO_WIDTH: u32 = 300;

    /// Fixed aspect ratio (width, height) when not derived from the first frame
    pub const ASPECT_RATIO: (u32, u32) = (4, 3);

    /// Outer padding around the photo column
    pub const PADDING: u32 = 20;

    /// Gap between two photos
    pub const GAP: u32 = 10;

    /// Height of the caption band below the last photo
    pub const CAPTION_BAND: u32 = 60;

    /// Caption font size in pixels
    pub const CAPTION_FONT_SIZE: f32 = 24.0;

    /// Radius of rounded photo corners
    pub const CORNER_RADIUS: f32 = 8.0;

    /// Width of the backing panel visible around each photo
    pub const PANEL_INSET: f32 = 4.0;

    /// Vertical offset of the drop shadow
    pub const SHADOW_OFFSET: f32 = 3.0;

    /// Number of stacked layers approximating the soft shadow edge
    pub const SHADOW_LAYERS: u32 = 4;

    pub const BACKGROUND: &str = "#fff0f3";
    pub const PANEL: &str = "#ffffff";
    pub const SHADOW: &str = "#00000040";
    pub const CAPTION_COLOR: &str = "#ff6b6b";
}

/// User-facing status strings
pub mod status {
    use super::PHOTO_COUNT;

    pub const IDLE: &str = "Press start to take photos";
    pub const GET_READY: &str = "Get ready!";
    pub const CREATING_STRIP: &str = "All photos taken! Creating photo strip...";
    pub const READY: &str = "Your photo strip is ready!";
    pub const CAMERA_ERROR: &str = "Error accessing camera. Please allow camera access.";
    pub const DEVICE_LOST: &str = "Camera disconnected. Press start to try again.";
    pub const ENCODE_FAILED: &str = "Could not create the photo strip. Please try again.";
    pub const CANCELLED: &str = "Session cancelled.";
    pub const SAVE_FAILED: &str = "Could not save the photo strip. Please try again.";

    /// Label of the start control before the first strip
    pub const START_LABEL: &str = "Start";

    /// Label of the start control once a strip is ready
    pub const RETAKE_LABEL: &str = "Take New Photos";

    pub fn taking_photo(index: usize) -> String {
        format!("Taking photo {} of {}", index + 1, PHOTO_COUNT)
    }

    pub fn photo_taken(taken: usize) -> String {
        if taken < PHOTO_COUNT {
            format!("Photo {} taken! Get ready for the next one.", taken)
        } else {
            CREATING_STRIP.to_string()
        }
    }

    pub fn saved(path: &std::path::Path) -> String {
        format!("Saved: {}", path.display())
    }
}

/// Supported still-image inputs
pub mod file_formats {
    /// Image file extensions accepted by the file source and `compose`
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progression() {
        assert_eq!(status::taking_photo(0), "Taking photo 1 of 3");
        assert_eq!(
            status::photo_taken(1),
            "Photo 1 taken! Get ready for the next one."
        );
        assert_eq!(status::photo_taken(PHOTO_COUNT), status::CREATING_STRIP);
    }

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("PNG"));
        assert!(file_formats::is_image_extension("jpeg"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
