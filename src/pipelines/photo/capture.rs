// SPDX-License-Identifier: GPL-3.0-only

//! Taking a still from the live feed
//!
//! A capture only keeps a reference to the raw frame. Conversion to RGBA at
//! the working canvas size is deferred to [`CapturedFrame::decode`], which
//! the composer runs for all frames at once.

use crate::backends::camera::format_converters::frame_to_rgba;
use crate::backends::camera::types::{BackendResult, CameraFrame, Resolution};
use crate::backends::camera::LiveFeed;
use crate::errors::ComposeError;
use image::RgbaImage;
use image::imageops::FilterType;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One still tagged with the countdown cycle that produced it
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub index: usize,
    pub raw: Arc<CameraFrame>,
    /// Working canvas size: the resolution the source actually delivered
    pub canvas: Resolution,
}

impl CapturedFrame {
    pub fn new(index: usize, raw: Arc<CameraFrame>, canvas: Resolution) -> Self {
        Self { index, raw, canvas }
    }

    /// Convert to RGBA at canvas size on the blocking pool
    pub async fn decode(&self) -> Result<RgbaImage, ComposeError> {
        let raw = self.raw.clone();
        let canvas = self.canvas;
        let index = self.index;

        tokio::task::spawn_blocking(move || -> Result<RgbaImage, ComposeError> {
            let rgba = frame_to_rgba(&raw).map_err(|reason| ComposeError::Decode { index, reason })?;
            if canvas.is_empty() || rgba.dimensions() == (canvas.width, canvas.height) {
                return Ok(rgba);
            }
            debug!(index, from = ?rgba.dimensions(), to = %canvas, "Scaling frame to canvas");
            Ok(image::imageops::resize(
                &rgba,
                canvas.width,
                canvas.height,
                FilterType::Triangle,
            ))
        })
        .await?
    }
}

/// Photo capture handler
pub struct PhotoCapture;

impl PhotoCapture {
    /// Sample the feed's current frame for countdown cycle `index`
    ///
    /// # Arguments
    /// * `feed` - Running live feed
    /// * `index` - Zero-based cycle index
    /// * `timeout` - Longest wait if the feed has not produced a frame yet
    ///
    /// # Returns
    /// * `Ok(CapturedFrame)` - Frame at the feed's actual resolution
    /// * `Err(BackendError)` - The feed is gone
    pub async fn take(
        feed: &mut LiveFeed,
        index: usize,
        timeout: Duration,
    ) -> BackendResult<CapturedFrame> {
        let raw = feed.current_frame(timeout).await?;
        debug!(
            index,
            sequence = raw.sequence,
            width = raw.width,
            height = raw.height,
            format = ?raw.format,
            "Frame captured"
        );
        Ok(CapturedFrame::new(index, raw, feed.resolution()))
    }
}
