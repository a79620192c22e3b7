// SPDX-License-Identifier: GPL-3.0-only

//! Strip composition
//!
//! Decodes every captured frame concurrently, then paints the strip on a
//! tiny-skia canvas: background, per-photo shadow and panel, rounded photos
//! and the caption. Text goes through usvg so it is shaped with real fonts.

use super::capture::CapturedFrame;
use super::encoding::{ComposedStrip, StripEncoder};
use super::layout::{Rect, StripLayout};
use crate::config::{HexColor, StripStyle};
use crate::constants::{CAPTION, PHOTO_COUNT, strip};
use crate::errors::ComposeError;
use futures::future::try_join_all;
use image::RgbaImage;
use image::imageops::FilterType;
use resvg::tiny_skia::{
    self, FillRule, FilterQuality, IntSize, Paint, Path as SkPath, PathBuilder, Pattern, Pixmap,
    SpreadMode, Transform,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Circle approximation constant for cubic Bézier corners
const KAPPA: f32 = 0.552_284_8;

/// Builds strips from captured frames
#[derive(Clone)]
pub struct StripComposer {
    style: StripStyle,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl StripComposer {
    /// Composer with system fonts plus the style's extra font directories
    pub fn new(style: StripStyle) -> Self {
        let fontdb = build_fontdb(&style.font_dirs);
        Self { style, fontdb }
    }

    pub fn style(&self) -> &StripStyle {
        &self.style
    }

    /// Compose exactly [`PHOTO_COUNT`] frames into an encoded strip
    ///
    /// Every frame's decode future must complete before anything is drawn;
    /// the first decode error aborts the whole composition.
    pub async fn compose(&self, frames: &[CapturedFrame]) -> Result<ComposedStrip, ComposeError> {
        if frames.len() != PHOTO_COUNT {
            return Err(ComposeError::FrameCount {
                captured: frames.len(),
                expected: PHOTO_COUNT,
            });
        }

        let layout = StripLayout::new(&self.style, frames[0].canvas, frames.len())?;
        let images = try_join_all(frames.iter().map(|frame| frame.decode())).await?;

        info!(
            width = layout.width,
            height = layout.height,
            frames = frames.len(),
            "Composing strip"
        );

        let style = self.style.clone();
        let fontdb = self.fontdb.clone();
        tokio::task::spawn_blocking(move || -> Result<ComposedStrip, ComposeError> {
            let pixmap = render(&layout, &images, &style, fontdb)?;
            StripEncoder::encode(&pixmap)
        })
        .await?
    }
}

fn build_fontdb(extra_dirs: &[std::path::PathBuf]) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    for dir in extra_dirs {
        load_fonts_from_dir(&mut db, dir);
    }
    if db.is_empty() {
        warn!("No fonts found, the caption will not be drawn");
    } else {
        debug!(faces = db.len(), "Caption fonts loaded");
    }
    Arc::new(db)
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "Font directory not readable");
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        let is_font = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"));
        if is_font && let Err(e) = db.load_font_file(&path) {
            warn!(path = %path.display(), error = %e, "Skipping font");
        }
    }
}

/// Paint the strip
pub fn render(
    layout: &StripLayout,
    photos: &[RgbaImage],
    style: &StripStyle,
    fontdb: Arc<usvg::fontdb::Database>,
) -> Result<Pixmap, ComposeError> {
    let mut canvas = Pixmap::new(layout.width, layout.height).ok_or_else(|| {
        ComposeError::Canvas(format!("cannot allocate {}x{}", layout.width, layout.height))
    })?;
    canvas.fill(color(style.background));

    for (index, photo) in photos.iter().enumerate() {
        draw_photo(&mut canvas, layout.slot(index), photo, style)?;
    }

    draw_caption(&mut canvas, layout, style, fontdb)?;
    Ok(canvas)
}

fn draw_photo(
    canvas: &mut Pixmap,
    slot: Rect,
    photo: &RgbaImage,
    style: &StripStyle,
) -> Result<(), ComposeError> {
    let x = slot.x as f32;
    let y = slot.y as f32;
    let w = slot.width as f32;
    let h = slot.height as f32;
    let inset = style.panel_inset;
    let radius = style.corner_radius;

    if style.shadow {
        let layers = strip::SHADOW_LAYERS.max(1);
        let alpha = (style.shadow_color.a as u32 / layers).max(1) as u8;
        for layer in 0..layers {
            let spread = inset + (layers - layer) as f32;
            let path = rounded_rect(
                x - spread,
                y - spread + strip::SHADOW_OFFSET,
                w + 2.0 * spread,
                h + 2.0 * spread,
                radius + spread,
            )?;
            let mut paint = Paint::default();
            paint.set_color_rgba8(
                style.shadow_color.r,
                style.shadow_color.g,
                style.shadow_color.b,
                alpha,
            );
            paint.anti_alias = true;
            canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    let panel = rounded_rect(
        x - inset,
        y - inset,
        w + 2.0 * inset,
        h + 2.0 * inset,
        radius + inset,
    )?;
    let mut paint = Paint::default();
    paint.set_color(color(style.panel));
    paint.anti_alias = true;
    canvas.fill_path(&panel, &paint, FillRule::Winding, Transform::identity(), None);

    let scaled = image::imageops::resize(photo, slot.width, slot.height, FilterType::Triangle);
    let texture = to_pixmap(scaled)?;
    let frame = rounded_rect(x, y, w, h, radius)?;
    let paint = Paint {
        shader: Pattern::new(
            texture.as_ref(),
            SpreadMode::Pad,
            FilterQuality::Nearest,
            1.0,
            Transform::from_translate(x, y),
        ),
        anti_alias: true,
        ..Default::default()
    };
    canvas.fill_path(&frame, &paint, FillRule::Winding, Transform::identity(), None);
    Ok(())
}

fn draw_caption(
    canvas: &mut Pixmap,
    layout: &StripLayout,
    style: &StripStyle,
    fontdb: Arc<usvg::fontdb::Database>,
) -> Result<(), ComposeError> {
    if fontdb.is_empty() {
        return Ok(());
    }

    let band = layout.caption_area();
    let size = style.caption_font_size;
    // Baseline that visually centres cap height inside the band
    let baseline = band.y as f32 + band.height as f32 / 2.0 + size * 0.35;
    let svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><text x="{cx}" y="{baseline}" text-anchor="middle" font-family="Arial, Helvetica, sans-serif" font-weight="bold" font-size="{size}" fill="{fill}">{text}</text></svg>"#,
        w = layout.width,
        h = layout.height,
        cx = layout.width as f32 / 2.0,
        fill = style.caption_color,
        text = escape_xml(CAPTION),
    );

    let options = usvg::Options {
        fontdb,
        font_resolver: caption_font_resolver(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &options)
        .map_err(|e| ComposeError::Caption(e.to_string()))?;
    resvg::render(&tree, Transform::identity(), &mut canvas.as_mut());
    Ok(())
}

/// Font lookup that never drops the caption
///
/// Tries the requested families, then the generic families, then settles for
/// any bold face and finally any face at all.
fn caption_font_resolver() -> usvg::FontResolver<'static> {
    use usvg::fontdb::{Family, Query, Stretch, Style, Weight};

    usvg::FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families: Vec<Family<'_>> = font
                .families()
                .iter()
                .map(|family| match family {
                    usvg::FontFamily::Serif => Family::Serif,
                    usvg::FontFamily::SansSerif => Family::SansSerif,
                    usvg::FontFamily::Cursive => Family::Cursive,
                    usvg::FontFamily::Fantasy => Family::Fantasy,
                    usvg::FontFamily::Monospace => Family::Monospace,
                    usvg::FontFamily::Named(name) => Family::Name(name),
                })
                .collect();
            families.extend([Family::SansSerif, Family::Serif, Family::Monospace]);

            let style = match font.style() {
                usvg::FontStyle::Normal => Style::Normal,
                usvg::FontStyle::Italic => Style::Italic,
                usvg::FontStyle::Oblique => Style::Oblique,
            };
            let query = Query {
                families: &families,
                weight: Weight(font.weight()),
                stretch: Stretch::Normal,
                style,
            };
            if let Some(id) = fontdb.query(&query) {
                return Some(id);
            }

            let bold = fontdb
                .faces()
                .find(|face| face.weight.0 >= font.weight() && face.style == Style::Normal);
            let chosen = bold.or_else(|| fontdb.faces().next())?;
            debug!(family = ?chosen.families.first(), "Caption font fallback");
            Some(chosen.id)
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn color(c: HexColor) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

/// Premultiply and wrap an RGBA image
fn to_pixmap(image: RgbaImage) -> Result<Pixmap, ComposeError> {
    let (width, height) = image.dimensions();
    let mut data = image.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a < 255 {
            for c in &mut px[..3] {
                *c = ((*c as u16 * a + 127) / 255) as u8;
            }
        }
    }
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| ComposeError::Canvas(format!("invalid photo size {}x{}", width, height)))?;
    Pixmap::from_vec(data, size)
        .ok_or_else(|| ComposeError::Canvas("photo buffer size mismatch".into()))
}

fn rounded_rect(x: f32, y: f32, w: f32, h: f32, r: f32) -> Result<SkPath, ComposeError> {
    let r = r.clamp(0.0, w.min(h) / 2.0);
    let k = r * KAPPA;
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
        .ok_or_else(|| ComposeError::Canvas(format!("degenerate rect {}x{}", w, h)))
}
