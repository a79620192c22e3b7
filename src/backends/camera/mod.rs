// SPDX-License-Identifier: GPL-3.0-only

//! Camera source abstraction
//!
//! A [`CameraSource`] turns [`SourceConstraints`] into a running [`LiveFeed`].
//! The feed owns the underlying stream: it is stopped exactly once, either by
//! [`LiveFeed::release`] or when the feed is dropped.
//!
//! ```text
//! CameraSource::acquire ──► LiveFeed ──► current_frame() ──► CameraFrame
//!                              │
//!                              └──► subscribe() (live preview)
//! ```

pub mod file_source;
pub mod format_converters;
pub mod synthetic;
pub mod types;
pub mod v4l2;

pub use file_source::FileSource;
pub use synthetic::SyntheticSource;
pub use types::*;
pub use v4l2::V4l2Source;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Latest-frame channel shared between a stream and its consumers
pub type FrameWatch = watch::Receiver<Option<Arc<CameraFrame>>>;

/// Producer side of [`FrameWatch`]
pub type FramePublisher = watch::Sender<Option<Arc<CameraFrame>>>;

/// Something that can hand out a live frame stream
pub trait CameraSource: Send {
    /// Human readable source name for logs
    fn name(&self) -> String;

    /// Open the device and start streaming
    ///
    /// The returned feed reports the resolution the device actually
    /// delivers, which may differ from `constraints.preferred`.
    fn acquire(
        &mut self,
        constraints: &SourceConstraints,
    ) -> impl Future<Output = BackendResult<LiveFeed>> + Send;
}

/// Control side of a running stream, owned by its [`LiveFeed`]
pub trait StreamHandle: Send {
    /// Stop producing frames and release the device
    fn stop(self: Box<Self>);

    /// Called after the session consumed a frame
    fn frame_taken(&mut self) {}
}

/// A running camera stream
pub struct LiveFeed {
    label: String,
    resolution: Resolution,
    frames: FrameWatch,
    stream: Option<Box<dyn StreamHandle>>,
}

impl LiveFeed {
    pub fn new(
        label: impl Into<String>,
        resolution: Resolution,
        frames: FrameWatch,
        stream: Box<dyn StreamHandle>,
    ) -> Self {
        Self {
            label: label.into(),
            resolution,
            frames,
            stream: Some(stream),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resolution the source actually delivers
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Independent receiver for live preview rendering
    pub fn subscribe(&self) -> FrameWatch {
        self.frames.clone()
    }

    /// False once the producer has gone away
    pub fn is_alive(&self) -> bool {
        self.stream.is_some() && self.frames.has_changed().is_ok()
    }

    /// Most recent frame, waiting up to `timeout` for the first one
    ///
    /// A closed stream or a feed that never produces a frame within the
    /// timeout is reported as [`BackendError::Disconnected`].
    pub async fn current_frame(&mut self, timeout: Duration) -> BackendResult<Arc<CameraFrame>> {
        if !self.is_alive() {
            return Err(BackendError::Disconnected(format!(
                "{}: stream closed",
                self.label
            )));
        }

        let latest = self.frames.borrow_and_update().clone();
        let frame = match latest {
            Some(frame) => frame,
            None => {
                debug!(source = %self.label, "Waiting for first frame");
                match tokio::time::timeout(timeout, self.frames.wait_for(Option::is_some)).await {
                    Ok(Ok(frame)) => frame.clone().ok_or_else(|| {
                        BackendError::Disconnected(format!("{}: empty frame", self.label))
                    })?,
                    Ok(Err(_)) => {
                        return Err(BackendError::Disconnected(format!(
                            "{}: stream closed",
                            self.label
                        )));
                    }
                    Err(_) => {
                        return Err(BackendError::Disconnected(format!(
                            "{}: no frame within {:?}",
                            self.label, timeout
                        )));
                    }
                }
            }
        };

        if let Some(stream) = self.stream.as_mut() {
            stream.frame_taken();
        }
        Ok(frame)
    }

    /// Stop the stream now
    pub fn release(mut self) {
        self.stop_stream();
    }

    fn stop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!(source = %self.label, "Releasing camera");
            stream.stop();
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

impl std::fmt::Debug for LiveFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeed")
            .field("label", &self.label)
            .field("resolution", &self.resolution)
            .field("running", &self.stream.is_some())
            .finish()
    }
}
