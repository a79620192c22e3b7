// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `$XDG_CONFIG_HOME/photobooth/config.json`. Every field has
//! a default, so partial files are fine and a missing file means defaults.

use crate::constants::{DEFAULT_SAVE_FOLDER, resolution, strip, timing};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const CONFIG_DIR: &str = "photobooth";
const CONFIG_FILE: &str = "config.json";

/// An sRGB colour written as `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl HexColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` / `#rrggbbaa` (leading `#` optional)
    pub fn parse(value: &str) -> Result<Self, String> {
        let hex = value.trim().trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return Err(format!("invalid colour '{}': expected #rrggbb", value));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("invalid colour '{}': bad hex digits", value))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 255 },
        })
    }

    fn from_const(value: &'static str) -> Self {
        Self::parse(value).unwrap_or(Self::rgb(0, 0, 0))
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

impl std::fmt::Display for HexColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

/// How photo slot height is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AspectMode {
    /// Fixed width:height ratio for every slot
    Fixed { width: u32, height: u32 },
    /// Keep the first captured frame's aspect ratio
    FirstFrame,
}

impl Default for AspectMode {
    fn default() -> Self {
        let (width, height) = strip::ASPECT_RATIO;
        AspectMode::Fixed { width, height }
    }
}

/// Camera selection and negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// V4L2 device path; first capture device when unset
    pub device_path: Option<String>,
    /// Requested resolution width (a hint, not a guarantee)
    pub preferred_width: u32,
    /// Requested resolution height
    pub preferred_height: u32,
    /// Mirror the live preview horizontally (selfie mode)
    pub mirror_preview: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_path: None,
            preferred_width: resolution::PREFERRED_WIDTH,
            preferred_height: resolution::PREFERRED_HEIGHT,
            mirror_preview: true,
        }
    }
}

/// Countdown and pause durations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub tick_ms: u64,
    pub countdown_from: u32,
    pub pause_ms: u64,
    pub warmup_ms: u64,
    pub frame_timeout_ms: u64,
}

impl TimingSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            tick_ms: timing::TICK.as_millis() as u64,
            countdown_from: timing::COUNTDOWN_FROM,
            pause_ms: timing::CAPTURE_PAUSE.as_millis() as u64,
            warmup_ms: timing::WARMUP.as_millis() as u64,
            frame_timeout_ms: timing::FRAME_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Strip layout and decoration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripStyle {
    pub photo_width: u32,
    pub aspect: AspectMode,
    pub padding: u32,
    pub gap: u32,
    pub caption_band: u32,
    pub caption_font_size: f32,
    pub corner_radius: f32,
    pub panel_inset: f32,
    pub shadow: bool,
    pub background: HexColor,
    pub panel: HexColor,
    pub shadow_color: HexColor,
    pub caption_color: HexColor,
    /// Extra directories searched for caption fonts
    pub font_dirs: Vec<PathBuf>,
}

impl Default for StripStyle {
    fn default() -> Self {
        Self {
            photo_width: strip::PHOTO_WIDTH,
            aspect: AspectMode::default(),
            padding: strip::PADDING,
            gap: strip::GAP,
            caption_band: strip::CAPTION_BAND,
            caption_font_size: strip::CAPTION_FONT_SIZE,
            corner_radius: strip::CORNER_RADIUS,
            panel_inset: strip::PANEL_INSET,
            shadow: true,
            background: HexColor::from_const(strip::BACKGROUND),
            panel: HexColor::from_const(strip::PANEL),
            shadow_color: HexColor::from_const(strip::SHADOW),
            caption_color: HexColor::from_const(strip::CAPTION_COLOR),
            font_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraSettings,
    pub timing: TimingSettings,
    pub strip: StripStyle,
    /// Download directory; `~/Pictures/Photobooth` when unset
    pub output_dir: Option<PathBuf>,
    /// Pulse sysfs flash LEDs on capture
    pub hardware_flash: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            timing: TimingSettings::default(),
            strip: StripStyle::default(),
            output_dir: None,
            hardware_flash: false,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the user config, falling back to defaults on any problem
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            warn!("No config directory, using defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Directory strips are downloaded into
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }
}

/// `~/Pictures/Photobooth`, falling back to home or the working directory
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors_parse_with_and_without_alpha() {
        assert_eq!(
            HexColor::parse("#ff6b6b").unwrap(),
            HexColor::rgb(0xff, 0x6b, 0x6b)
        );
        let shadow = HexColor::parse("00000040").unwrap();
        assert_eq!(shadow.a, 0x40);
        assert_eq!(shadow.to_string(), "#00000040");
        assert!(HexColor::parse("#fff").is_err());
        assert!(HexColor::parse("#gg0000").is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "timing": { "tick_ms": 250 }, "hardware_flash": true }"#)
                .unwrap();
        assert_eq!(config.timing.tick(), Duration::from_millis(250));
        assert_eq!(config.timing.countdown_from, timing::COUNTDOWN_FROM);
        assert!(config.hardware_flash);
        assert_eq!(config.strip, StripStyle::default());
    }

    #[test]
    fn test_aspect_mode_is_tagged() {
        let style: StripStyle =
            serde_json::from_str(r#"{ "aspect": { "mode": "first_frame" } }"#).unwrap();
        assert_eq!(style.aspect, AspectMode::FirstFrame);
    }

    #[test]
    fn test_default_colors_are_valid() {
        let style = StripStyle::default();
        assert_eq!(style.caption_color, HexColor::rgb(0xff, 0x6b, 0x6b));
        assert_eq!(style.background.a, 255);
    }
}
