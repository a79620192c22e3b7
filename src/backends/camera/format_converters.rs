// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to RGBA
//!
//! Every captured frame goes through [`frame_to_rgba`] before it can be drawn
//! onto the strip. Packed YUV uses BT.601 coefficients.

use super::types::{CameraFrame, PixelFormat};
use image::RgbaImage;

/// Convert a camera frame of any supported format into an RGBA image
pub fn frame_to_rgba(frame: &CameraFrame) -> Result<RgbaImage, String> {
    if frame.width == 0 || frame.height == 0 {
        return Err("empty frame".to_string());
    }

    if frame.format == PixelFormat::MJPEG {
        return decode_mjpeg(&frame.data, frame.width, frame.height);
    }

    let bpp = frame.format.bytes_per_pixel().unwrap_or(4);
    let row_bytes = (frame.width * bpp) as usize;
    let stride = (frame.stride as usize).max(row_bytes);
    let needed = stride * (frame.height as usize - 1) + row_bytes;
    if frame.data.len() < needed {
        return Err(format!(
            "frame data too short: {} bytes for {}x{} {:?}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.format
        ));
    }

    let mut rgba = Vec::with_capacity((frame.width * frame.height * 4) as usize);
    for row in frame.data.chunks(stride).take(frame.height as usize) {
        let row = &row[..row_bytes];
        match frame.format {
            PixelFormat::RGBA => rgba.extend_from_slice(row),
            PixelFormat::RGB24 => {
                for px in row.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            }
            PixelFormat::Gray8 => {
                for &v in row {
                    rgba.extend_from_slice(&[v, v, v, 255]);
                }
            }
            PixelFormat::YUYV => packed_422_row(row, frame.width, [0, 2], 1, 3, &mut rgba),
            PixelFormat::UYVY => packed_422_row(row, frame.width, [1, 3], 0, 2, &mut rgba),
            PixelFormat::MJPEG => unreachable!("handled above"),
        }
    }

    RgbaImage::from_raw(frame.width, frame.height, rgba)
        .ok_or_else(|| "RGBA buffer size mismatch".to_string())
}

/// Convert one row of packed 4:2:2 (two pixels share chroma per 4 bytes)
fn packed_422_row(
    row: &[u8],
    width: u32,
    luma: [usize; 2],
    u_idx: usize,
    v_idx: usize,
    out: &mut Vec<u8>,
) {
    let mut written = 0;
    for chunk in row.chunks_exact(4) {
        for &l in &luma {
            if written == width {
                return;
            }
            let (r, g, b) = yuv_to_rgb(chunk[l], chunk[u_idx], chunk[v_idx]);
            out.extend_from_slice(&[r, g, b, 255]);
            written += 1;
        }
    }
}

/// Convert YUV (BT.601) to RGB
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

fn decode_mjpeg(data: &[u8], width: u32, height: u32) -> Result<RgbaImage, String> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| format!("MJPEG decode failed: {}", e))?;
    let rgba = img.to_rgba8();
    if rgba.width() != width || rgba.height() != height {
        // Some drivers report the negotiated size while the encoder differs
        tracing::debug!(
            expected = %format!("{}x{}", width, height),
            actual = %format!("{}x{}", rgba.width(), rgba.height()),
            "MJPEG frame size differs from negotiated format"
        );
    }
    Ok(rgba)
}
