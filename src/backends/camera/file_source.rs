// SPDX-License-Identifier: GPL-3.0-only

//! Still-image camera source
//!
//! Serves a list of image files as if they were a camera. The current image
//! stays on the feed until the session takes it, then the next one is
//! published, wrapping around at the end of the list.

use super::types::*;
use super::{CameraSource, FramePublisher, LiveFeed, StreamHandle};
use crate::constants::file_formats;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Camera source backed by image files
#[derive(Debug, Clone)]
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Every supported image in `dir`, sorted by name
    pub fn from_dir(dir: &Path) -> BackendResult<Self> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| BackendError::from_io(&dir.to_string_lossy(), &e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(file_formats::is_image_extension)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(BackendError::DeviceNotFound(format!(
                "{}: no images",
                dir.display()
            )));
        }
        Ok(Self::new(paths))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

fn load_frames(paths: &[PathBuf]) -> BackendResult<Vec<Arc<CameraFrame>>> {
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let image = image::open(path).map_err(|e| match e {
                image::ImageError::IoError(io) => {
                    BackendError::from_io(&path.to_string_lossy(), &io)
                }
                other => BackendError::FormatNotSupported(format!(
                    "{}: {}",
                    path.display(),
                    other
                )),
            })?;
            let rgba = image.into_rgba8();
            let (width, height) = rgba.dimensions();
            debug!(path = %path.display(), width, height, "Loaded still frame");
            Ok(Arc::new(CameraFrame::from_rgba(
                width,
                height,
                rgba.into_raw(),
                i as u64 + 1,
            )))
        })
        .collect()
}

impl CameraSource for FileSource {
    fn name(&self) -> String {
        format!("{} still image(s)", self.paths.len())
    }

    async fn acquire(&mut self, _constraints: &SourceConstraints) -> BackendResult<LiveFeed> {
        if self.paths.is_empty() {
            return Err(BackendError::DeviceNotFound("no input images".into()));
        }

        let paths = self.paths.clone();
        let frames = tokio::task::spawn_blocking(move || load_frames(&paths))
            .await
            .map_err(|e| BackendError::Io(e.to_string()))??;

        // Non-empty: paths was checked above and load_frames maps one to one
        let resolution = frames[0].resolution();
        let (tx, rx) = watch::channel(Some(frames[0].clone()));

        info!(images = frames.len(), %resolution, "Still image source started");

        Ok(LiveFeed::new(
            "files",
            resolution,
            rx,
            Box::new(Slideshow {
                frames,
                position: 0,
                publisher: tx,
            }),
        ))
    }
}

struct Slideshow {
    frames: Vec<Arc<CameraFrame>>,
    position: usize,
    publisher: FramePublisher,
}

impl StreamHandle for Slideshow {
    fn stop(self: Box<Self>) {
        debug!(shown = self.position, "Still image source stopped");
    }

    fn frame_taken(&mut self) {
        self.position = (self.position + 1) % self.frames.len();
        self.publisher
            .send_replace(Some(self.frames[self.position].clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    fn write_image(dir: &Path, name: &str, w: u32, h: u32, shade: u8) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([shade, 0, 0, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_feed_uses_first_image_size() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 8, 6, 10);
        let b = write_image(dir.path(), "b.png", 4, 4, 20);

        let mut source = FileSource::new(vec![a, b]);
        let feed = source.acquire(&SourceConstraints::default()).await.unwrap();
        assert_eq!(feed.resolution(), Resolution::new(8, 6));
    }

    #[tokio::test]
    async fn test_frames_advance_and_wrap() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "1.png", 2, 2, 1);
        write_image(dir.path(), "2.png", 2, 2, 2);
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let mut source = FileSource::from_dir(dir.path()).unwrap();
        assert_eq!(source.paths().len(), 2);

        let mut feed = source.acquire(&SourceConstraints::default()).await.unwrap();
        let timeout = Duration::from_secs(1);
        let shades: Vec<u8> = [
            feed.current_frame(timeout).await.unwrap(),
            feed.current_frame(timeout).await.unwrap(),
            feed.current_frame(timeout).await.unwrap(),
        ]
        .iter()
        .map(|f| f.data[0])
        .collect();
        assert_eq!(shades, vec![1, 2, 1]);
    }

    #[test]
    fn test_empty_dir_is_not_a_camera() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileSource::from_dir(dir.path()),
            Err(BackendError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_image_fails_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not a png").unwrap();

        let mut source = FileSource::new(vec![bogus]);
        assert!(source.acquire(&SourceConstraints::default()).await.is_err());
    }
}
