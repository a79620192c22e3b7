// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing available cameras
//! - Taking a strip headlessly
//! - Composing a strip from existing images
//! - Printing the effective configuration

use anyhow::{Context, bail};
use photobooth::app::{BoothController, BoothEvent, Command};
use photobooth::backends::camera::types::{CameraFrame, Resolution};
use photobooth::backends::camera::v4l2::{enumerate_cameras, get_formats};
use photobooth::backends::camera::{CameraSource, FileSource, SyntheticSource, V4l2Source};
use photobooth::config::Config;
use photobooth::constants::{PHOTO_COUNT, status};
use photobooth::pipelines::photo::{CapturedFrame, StripComposer, StripEncoder};
use photobooth::terminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Where `strip` takes its frames from
pub enum SourceChoice {
    Camera(Option<usize>),
    Images(Vec<PathBuf>),
    TestPattern,
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Map a `list` index to a device path, falling back to the config
fn camera_path(config: &Config, index: Option<usize>) -> anyhow::Result<Option<String>> {
    let Some(index) = index else {
        return Ok(config.camera.device_path.clone());
    };
    let cameras = enumerate_cameras();
    if cameras.is_empty() {
        bail!("No cameras found");
    }
    match cameras.get(index) {
        Some(camera) => Ok(Some(camera.path.clone())),
        None => bail!(
            "Camera index {} out of range (0-{})",
            index,
            cameras.len() - 1
        ),
    }
}

pub fn run_terminal(config: Config, camera: Option<usize>, test_pattern: bool) -> anyhow::Result<()> {
    if test_pattern {
        terminal::run(SyntheticSource::default(), config)
    } else {
        let path = camera_path(&config, camera)?;
        terminal::run(V4l2Source::new(path), config)
    }
}

/// List all available cameras
pub fn list_cameras() -> anyhow::Result<()> {
    let cameras = enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.name, camera.path);
        if let Some(info) = &camera.device_info {
            println!("      Driver: {} on {}", info.driver, info.bus);
        }

        // Group formats by resolution and show the best framerate
        let mut resolutions: Vec<(u32, u32, u32)> = Vec::new();
        for format in get_formats(&camera.path) {
            let fps = format.framerate.map(|f| f.as_int()).unwrap_or(0);
            if let Some(existing) = resolutions
                .iter_mut()
                .find(|(w, h, _)| *w == format.width && *h == format.height)
            {
                existing.2 = existing.2.max(fps);
            } else {
                resolutions.push((format.width, format.height, fps));
            }
        }
        resolutions.sort_by_key(|(w, h, _)| std::cmp::Reverse(w * h));

        if !resolutions.is_empty() {
            let shown: Vec<String> = resolutions
                .iter()
                .take(3)
                .map(|(w, h, fps)| format!("{}x{}@{}fps", w, h, fps))
                .collect();
            println!("      Formats: {}", shown.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Run one session without a UI and download the strip
pub fn take_strip(
    mut config: Config,
    source: SourceChoice,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    if output.is_some() {
        config.output_dir = output;
    }

    let runtime = runtime()?;
    match source {
        SourceChoice::Camera(index) => {
            let path = camera_path(&config, index)?;
            runtime.block_on(drive_session(V4l2Source::new(path), config))
        }
        SourceChoice::Images(paths) => runtime.block_on(drive_session(FileSource::new(paths), config)),
        SourceChoice::TestPattern => {
            runtime.block_on(drive_session(SyntheticSource::default(), config))
        }
    }
}

async fn drive_session<S: CameraSource + 'static>(source: S, config: Config) -> anyhow::Result<()> {
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let (commands, command_rx) = mpsc::channel(8);

    println!("Using: {}", source.name());
    let controller = tokio::spawn(BoothController::new(source, config, event_tx).run(command_rx));

    let interrupt = commands.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.blocking_send(Command::Cancel);
        let _ = interrupt.blocking_send(Command::Quit);
    })
    .context("Failed to install Ctrl+C handler")?;

    commands.send(Command::Start).await?;

    let mut saved = None;
    let mut failure = None;
    while let Some(event) = events.recv().await {
        match event {
            BoothEvent::Status(text) => {
                println!("{}", text);
                if [
                    status::CAMERA_ERROR,
                    status::DEVICE_LOST,
                    status::ENCODE_FAILED,
                    status::CANCELLED,
                    status::SAVE_FAILED,
                ]
                .contains(&text.as_str())
                {
                    failure = Some(text);
                    let _ = commands.send(Command::Quit).await;
                }
            }
            BoothEvent::Countdown(Some(value)) => println!("  {}", value),
            BoothEvent::Flash => println!("  *click*"),
            BoothEvent::Preview(Some(strip)) => {
                println!("Strip: {}x{} ({} bytes)", strip.width, strip.height, strip.png.len());
                commands.send(Command::Download).await?;
            }
            BoothEvent::Downloaded(path) => {
                saved = Some(path);
                commands.send(Command::Quit).await?;
            }
            _ => {}
        }
    }

    let session = controller.await?;
    match (saved, failure) {
        (Some(path), _) => {
            println!("Saved to {}", path.display());
            Ok(())
        }
        (None, Some(reason)) => bail!("{} (session {})", reason, session.id()),
        (None, None) => bail!("Session ended without a strip"),
    }
}

/// Compose a strip from image files, skipping the camera entirely
pub fn compose_files(config: Config, inputs: Vec<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    if inputs.len() != PHOTO_COUNT {
        bail!("Need exactly {} images, got {}", PHOTO_COUNT, inputs.len());
    }

    let mut frames = Vec::with_capacity(inputs.len());
    for (index, path) in inputs.iter().enumerate() {
        let rgba = image::open(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .into_rgba8();
        let (width, height) = rgba.dimensions();
        let raw = CameraFrame::from_rgba(width, height, rgba.into_raw(), index as u64 + 1);
        frames.push(CapturedFrame::new(index, Arc::new(raw), Resolution::new(width, height)));
    }
    // every frame shares the first image's canvas, like a live session
    let canvas = frames[0].canvas;
    for frame in &mut frames {
        frame.canvas = canvas;
    }

    let output_dir = output.unwrap_or_else(|| config.output_dir());
    let runtime = runtime()?;
    let path = runtime.block_on(async {
        let strip = StripComposer::new(config.strip.clone()).compose(&frames).await?;
        anyhow::Ok(StripEncoder::save(&strip, &output_dir).await?)
    })?;

    println!("Saved to {}", path.display());
    Ok(())
}

/// Print the effective configuration as JSON
pub fn print_config(config: &Config, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        let path = config.save()?;
        eprintln!("Written to {}", path.display());
    }
    Ok(())
}
