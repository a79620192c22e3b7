// SPDX-License-Identifier: GPL-3.0-only

//! Test-pattern camera source
//!
//! Publishes colour bars at a fixed rate. Used by `strip --test-pattern` and
//! by the session tests, which can make it refuse access, report a native
//! resolution different from the requested one, or drop out mid-session.

use super::types::*;
use super::{CameraSource, FramePublisher, LiveFeed, StreamHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// SMPTE-style bar colours, left to right
const BARS: [[u8; 3]; 7] = [
    [192, 192, 192],
    [192, 192, 0],
    [0, 192, 192],
    [0, 192, 0],
    [192, 0, 192],
    [192, 0, 0],
    [0, 0, 192],
];

/// Behaviour knobs for [`SyntheticSource`]
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    /// Resolution the "sensor" actually delivers; the request when `None`
    pub native: Option<Resolution>,
    pub fps: u32,
    /// Fail every acquisition with this error
    pub deny: Option<BackendError>,
    /// Stop delivering after this many frames were taken
    pub lose_after: Option<usize>,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            native: None,
            fps: 15,
            deny: None,
            lose_after: None,
        }
    }
}

/// Colour-bar camera
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    options: SyntheticOptions,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    taken: Arc<AtomicU64>,
}

impl SyntheticSource {
    pub fn new(options: SyntheticOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Successful acquisitions so far
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Streams stopped so far
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Frames handed to the session so far
    pub fn frames_taken(&self) -> u64 {
        self.taken.load(Ordering::SeqCst)
    }
}

/// One frame of vertical colour bars
pub fn color_bars(resolution: Resolution) -> Vec<u8> {
    let Resolution { width, height } = resolution;
    let mut row = Vec::with_capacity(width as usize * 4);
    for x in 0..width {
        let bar = (x as usize * BARS.len()) / width.max(1) as usize;
        let [r, g, b] = BARS[bar.min(BARS.len() - 1)];
        row.extend_from_slice(&[r, g, b, 255]);
    }
    row.repeat(height as usize)
}

impl CameraSource for SyntheticSource {
    fn name(&self) -> String {
        "Test pattern".to_string()
    }

    async fn acquire(&mut self, constraints: &SourceConstraints) -> BackendResult<LiveFeed> {
        if let Some(err) = &self.options.deny {
            info!(error = %err, "Test pattern refusing access");
            return Err(err.clone());
        }

        let resolution = self.options.native.unwrap_or(constraints.preferred);
        if resolution.is_empty() {
            return Err(BackendError::FormatNotSupported(resolution.to_string()));
        }

        let pixels: Arc<[u8]> = Arc::from(color_bars(resolution).into_boxed_slice());
        let period = Duration::from_secs(1) / self.options.fps.max(1);
        let (tx, rx) = watch::channel(None);

        let task = tokio::spawn(publish(tx, resolution, pixels, period));

        self.acquired.fetch_add(1, Ordering::SeqCst);
        info!(
            requested = %constraints.preferred,
            actual = %resolution,
            "Test pattern started"
        );

        Ok(LiveFeed::new(
            "test-pattern",
            resolution,
            rx,
            Box::new(PatternStream {
                task,
                taken: 0,
                lose_after: self.options.lose_after,
                released: self.released.clone(),
                total_taken: self.taken.clone(),
            }),
        ))
    }
}

async fn publish(tx: FramePublisher, resolution: Resolution, pixels: Arc<[u8]>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    let mut sequence = 0u64;
    loop {
        interval.tick().await;
        sequence += 1;
        let frame = CameraFrame {
            width: resolution.width,
            height: resolution.height,
            data: pixels.clone(),
            format: PixelFormat::RGBA,
            stride: resolution.width * 4,
            sequence,
            captured_at: Instant::now(),
        };
        if tx.send(Some(Arc::new(frame))).is_err() {
            break;
        }
    }
}

struct PatternStream {
    task: JoinHandle<()>,
    taken: usize,
    lose_after: Option<usize>,
    released: Arc<AtomicUsize>,
    total_taken: Arc<AtomicU64>,
}

impl StreamHandle for PatternStream {
    fn stop(self: Box<Self>) {
        self.task.abort();
        self.released.fetch_add(1, Ordering::SeqCst);
        debug!(taken = self.taken, "Test pattern stopped");
    }

    fn frame_taken(&mut self) {
        self.taken += 1;
        self.total_taken.fetch_add(1, Ordering::SeqCst);
        if self.lose_after.is_some_and(|limit| self.taken >= limit) {
            info!(taken = self.taken, "Test pattern simulating unplug");
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_fill_frame() {
        let pixels = color_bars(Resolution::new(14, 2));
        assert_eq!(pixels.len(), 14 * 2 * 4);
        assert_eq!(&pixels[0..4], &[192, 192, 192, 255]);
        assert_eq!(&pixels[13 * 4..14 * 4], &[0, 0, 192, 255]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_resolution_overrides_request() {
        let mut source = SyntheticSource::new(SyntheticOptions {
            native: Some(Resolution::new(64, 48)),
            ..Default::default()
        });
        let mut feed = source.acquire(&SourceConstraints::default()).await.unwrap();
        assert_eq!(feed.resolution(), Resolution::new(64, 48));

        let frame = feed.current_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame.resolution(), Resolution::new(64, 48));

        feed.release();
        assert_eq!(source.acquired(), 1);
        assert_eq!(source.released(), 1);
    }

    #[tokio::test]
    async fn test_denied_source_never_starts() {
        let mut source = SyntheticSource::new(SyntheticOptions {
            deny: Some(BackendError::PermissionDenied("test".into())),
            ..Default::default()
        });
        assert!(source.acquire(&SourceConstraints::default()).await.is_err());
        assert_eq!(source.acquired(), 0);
        assert_eq!(source.released(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unplug_after_limit() {
        let mut source = SyntheticSource::new(SyntheticOptions {
            native: Some(Resolution::new(8, 8)),
            lose_after: Some(1),
            ..Default::default()
        });
        let mut feed = source.acquire(&SourceConstraints::default()).await.unwrap();
        let timeout = Duration::from_secs(1);
        feed.current_frame(timeout).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!feed.is_alive());
        assert!(feed.current_frame(timeout).await.is_err());
    }
}
