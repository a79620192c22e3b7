// SPDX-License-Identifier: GPL-3.0-only

//! PNG encoding and saving of finished strips

use crate::constants::STRIP_FILENAME;
use crate::errors::ComposeError;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use resvg::tiny_skia::Pixmap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// An encoded strip: the bytes previewed and later downloaded
#[derive(Clone, PartialEq, Eq)]
pub struct ComposedStrip {
    pub png: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

impl ComposedStrip {
    /// Decode the PNG back into pixels (for previews)
    pub fn to_rgba(&self) -> Result<RgbaImage, ComposeError> {
        image::load_from_memory_with_format(&self.png, image::ImageFormat::Png)
            .map(|img| img.into_rgba8())
            .map_err(|e| ComposeError::Encode(e.to_string()))
    }
}

impl std::fmt::Debug for ComposedStrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedStrip")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

/// Strip encoder
pub struct StripEncoder;

impl StripEncoder {
    /// Encode a rendered canvas as PNG with the best compression
    ///
    /// # Arguments
    /// * `pixmap` - Rendered strip (premultiplied RGBA)
    ///
    /// # Returns
    /// * `Ok(ComposedStrip)` - Encoded strip
    /// * `Err(ComposeError)` - Encoder failure
    pub fn encode(pixmap: &Pixmap) -> Result<ComposedStrip, ComposeError> {
        let (width, height) = (pixmap.width(), pixmap.height());

        let mut rgba = Vec::with_capacity(pixmap.data().len());
        for px in pixmap.pixels() {
            let c = px.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }

        let mut png = Vec::new();
        PngEncoder::new_with_quality(&mut png, CompressionType::Best, FilterType::Adaptive)
            .write_image(&rgba, width, height, ExtendedColorType::Rgba8)
            .map_err(|e| ComposeError::Encode(e.to_string()))?;

        debug!(width, height, size = png.len(), "Strip encoded");
        Ok(ComposedStrip {
            png: Arc::from(png),
            width,
            height,
        })
    }

    /// Write the strip's PNG bytes to `<output_dir>/photobooth-strip.png`
    ///
    /// Creates the directory when needed and overwrites an earlier download.
    pub async fn save(strip: &ComposedStrip, output_dir: &Path) -> std::io::Result<PathBuf> {
        let path = output_dir.join(STRIP_FILENAME);
        let dir = output_dir.to_path_buf();
        let target = path.clone();
        let bytes = strip.png.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            std::fs::write(&target, &bytes)
        })
        .await
        .map_err(std::io::Error::other)??;

        info!(path = %path.display(), size = strip.png.len(), "Strip saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resvg::tiny_skia::Color;

    fn strip() -> ComposedStrip {
        let mut pixmap = Pixmap::new(6, 4).unwrap();
        pixmap.fill(Color::from_rgba8(255, 107, 107, 255));
        StripEncoder::encode(&pixmap).unwrap()
    }

    #[test]
    fn test_encoded_png_decodes_to_same_pixels() {
        let strip = strip();
        assert_eq!(&strip.png[..8], b"\x89PNG\r\n\x1a\n");
        let rgba = strip.to_rgba().unwrap();
        assert_eq!(rgba.dimensions(), (6, 4));
        assert_eq!(rgba.get_pixel(5, 3).0, [255, 107, 107, 255]);
    }

    #[tokio::test]
    async fn test_save_writes_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let strip = strip();

        let path = StripEncoder::save(&strip, &out).await.unwrap();
        assert_eq!(path.file_name().unwrap(), STRIP_FILENAME);
        assert_eq!(std::fs::read(&path).unwrap(), strip.png.to_vec());
    }
}
