// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use photobooth::Config;
use photobooth::config::{AspectMode, HexColor};
use std::path::PathBuf;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(
        config.camera.mirror_preview,
        "Mirror preview should be enabled by default"
    );
    assert_eq!(
        (config.camera.preferred_width, config.camera.preferred_height),
        (1280, 720)
    );
    assert!(!config.hardware_flash);
}

#[test]
fn test_default_timing_is_one_unit_per_step() {
    let timing = Config::default().timing;
    assert_eq!(timing.countdown_from, 3);
    assert_eq!(timing.tick().as_millis(), 1000);
    assert_eq!(timing.pause().as_millis(), 1000);
    assert_eq!(timing.warmup().as_millis(), 1000);
}

#[test]
fn test_default_strip_style() {
    let style = Config::default().strip;
    assert_eq!(style.photo_width, 300);
    assert_eq!(style.padding, 20);
    assert_eq!(style.gap, 10);
    assert_eq!(style.caption_band, 60);
    assert_eq!(
        style.aspect,
        AspectMode::Fixed {
            width: 4,
            height: 3
        }
    );
    assert_eq!(style.caption_color, HexColor::parse("#ff6b6b").unwrap());
}

#[test]
fn test_output_dir_override() {
    let config = Config {
        output_dir: Some(PathBuf::from("/tmp/strips")),
        ..Default::default()
    };
    assert_eq!(config.output_dir(), PathBuf::from("/tmp/strips"));

    assert!(Config::default().output_dir().ends_with("Photobooth"));
}

#[test]
fn test_config_save_and_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.camera.device_path = Some("/dev/video2".into());
    config.strip.aspect = AspectMode::FirstFrame;
    config.strip.background = HexColor::rgb(1, 2, 3);
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"#010203\""));
}

#[test]
fn test_invalid_color_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r##"{ "strip": { "background": "pink" } }"##).unwrap();

    assert!(Config::load_from(&path).is_err());
}
