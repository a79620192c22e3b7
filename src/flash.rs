// SPDX-License-Identifier: GPL-3.0-only

//! Capture flash on real LEDs
//!
//! Phones and some laptops expose their flash at `/sys/class/leds/*:flash`.
//! When enabled in the config the booth drives these in torch mode (the
//! group-writable `brightness` file) for a short pulse on every capture.

use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LEDS_DIR: &str = "/sys/class/leds";

/// A flash LED device discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    max_brightness: u32,
    name: String,
}

impl FlashDevice {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set raw brightness value (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at a fraction of max brightness (0.0 = off, 1.0 = full)
    pub fn torch(&self, intensity: f32) -> io::Result<()> {
        let value = (intensity.clamp(0.0, 1.0) * self.max_brightness as f32).round() as u32;
        self.set_brightness(value)
    }
}

enum Probe {
    Usable(FlashDevice),
    NotWritable(String, PathBuf),
    Skip,
}

fn probe(led_path: PathBuf, name: &str) -> Probe {
    let max_brightness_path = led_path.join("max_brightness");
    let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
        Ok(s) => match s.trim().parse::<u32>() {
            Ok(v) if v > 0 => v,
            _ => {
                warn!(path = %max_brightness_path.display(), "Invalid max_brightness value");
                return Probe::Skip;
            }
        },
        Err(e) => {
            warn!(path = %max_brightness_path.display(), error = %e, "Cannot read max_brightness");
            return Probe::Skip;
        }
    };

    let brightness_path = led_path.join("brightness");
    match std::fs::OpenOptions::new().write(true).open(&brightness_path) {
        Ok(_) => {
            info!(name, max_brightness, "Discovered flash LED");
            Probe::Usable(FlashDevice {
                path: led_path,
                max_brightness,
                name: name.to_string(),
            })
        }
        Err(_) => {
            warn!(path = %brightness_path.display(), "Flash LED found but not writable");
            Probe::NotWritable(name.to_string(), brightness_path)
        }
    }
}

/// Flash LEDs available to the booth
///
/// Separates "hardware exists" from "we can control it" so the surfaces can
/// print a permission hint instead of silently skipping the flash.
#[derive(Debug, Clone, Default)]
pub struct FlashHardware {
    pub devices: Arc<Vec<FlashDevice>>,
    pub permission_error: Option<String>,
}

impl FlashHardware {
    /// Scan `/sys/class/leds/` for `*:flash` entries
    pub fn detect() -> Self {
        Self::detect_in(Path::new(LEDS_DIR))
    }

    /// Scan an arbitrary LED class directory
    pub fn detect_in(leds_dir: &Path) -> Self {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "No LED class directory, flash disabled");
            return Self::default();
        };

        let mut devices = Vec::new();
        let mut permission_failures = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.ends_with(":flash") {
                continue;
            }
            match probe(entry.path(), name) {
                Probe::Usable(device) => devices.push(device),
                Probe::NotWritable(name, path) => permission_failures.push((name, path)),
                Probe::Skip => {}
            }
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));

        let permission_error = (devices.is_empty() && !permission_failures.is_empty())
            .then(|| build_permission_error(&permission_failures));

        Self {
            devices: Arc::new(devices),
            permission_error,
        }
    }

    pub fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Light every LED for `duration` without blocking the caller
    ///
    /// Returns the task so callers that care can wait for the LEDs to go
    /// dark again.
    pub fn pulse(&self, duration: Duration) -> Option<tokio::task::JoinHandle<()>> {
        if !self.has_devices() {
            return None;
        }
        let devices = self.devices.clone();
        Some(tokio::spawn(async move {
            all_on(&devices);
            tokio::time::sleep(duration).await;
            all_off(&devices);
        }))
    }
}

/// Hint naming the group that owns the LED files
fn build_permission_error(failures: &[(String, PathBuf)]) -> String {
    let username = std::env::var("USER").unwrap_or_else(|_| "user".to_string());
    let escalation_tool = if Path::new("/usr/bin/doas").exists() {
        "doas"
    } else {
        "sudo"
    };

    let group = failures
        .first()
        .and_then(|(_, path)| {
            let gid = std::fs::metadata(path).ok()?.gid();
            let groups = std::fs::read_to_string("/etc/group").ok()?;
            groups.lines().find_map(|line| {
                let parts: Vec<&str> = line.split(':').collect();
                (parts.len() >= 3 && parts[2].parse::<u32>().ok() == Some(gid))
                    .then(|| parts[0].to_string())
            })
        })
        .unwrap_or_else(|| "feedbackd".to_string());

    format!(
        "Flash LEDs detected but cannot be controlled. \
         Run: {escalation_tool} adduser {username} {group}, then log in again."
    )
}

pub fn all_on(devices: &[FlashDevice]) {
    for dev in devices {
        if let Err(e) = dev.torch(1.0) {
            warn!(device = %dev.name, error = %e, "Failed to turn on flash LED");
        }
    }
}

pub fn all_off(devices: &[FlashDevice]) {
    for dev in devices {
        if let Err(e) = dev.off() {
            warn!(device = %dev.name, error = %e, "Failed to turn off flash LED");
        }
    }
}
