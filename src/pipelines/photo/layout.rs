// SPDX-License-Identifier: GPL-3.0-only

//! Strip geometry
//!
//! ```text
//! ┌───────────────┐
//! │    padding    │
//! │  ┌─────────┐  │
//! │  │ photo 1 │  │
//! │  └─────────┘  │  gap
//! │  ┌─────────┐  │
//! │  │ photo 2 │  │
//! │  └─────────┘  │  gap
//! │  ┌─────────┐  │
//! │  │ photo 3 │  │
//! │  └─────────┘  │
//! │ caption band  │
//! │    padding    │
//! └───────────────┘
//! ```

use crate::backends::camera::types::Resolution;
use crate::config::{AspectMode, StripStyle};
use crate::errors::ComposeError;

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Resolved positions of everything drawn on a strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripLayout {
    pub width: u32,
    pub height: u32,
    pub photo_width: u32,
    pub photo_height: u32,
    pub padding: u32,
    pub gap: u32,
    pub caption_band: u32,
    pub count: usize,
}

impl StripLayout {
    /// Layout for `count` photos whose source frames are `first_frame` sized
    ///
    /// Sizes come straight from the user's config, so a strip that does not
    /// fit in `u32` pixels is a [`ComposeError::Canvas`].
    pub fn new(
        style: &StripStyle,
        first_frame: Resolution,
        count: usize,
    ) -> Result<Self, ComposeError> {
        let photo_width = style.photo_width.max(1);
        let photo_height = photo_height(photo_width, style.aspect, first_frame)?;
        let n = count as u64;
        let padding = style.padding as u64;

        let width = photo_width as u64 + 2 * padding;
        let height = n * photo_height as u64
            + n.saturating_sub(1) * style.gap as u64
            + 2 * padding
            + style.caption_band as u64;

        Ok(Self {
            width: fit(width, "width")?,
            height: fit(height, "height")?,
            photo_width,
            photo_height,
            padding: style.padding,
            gap: style.gap,
            caption_band: style.caption_band,
            count,
        })
    }

    /// Slot of the `index`-th photo, top to bottom in capture order
    pub fn slot(&self, index: usize) -> Rect {
        Rect {
            x: self.padding,
            y: self.padding + index as u32 * (self.photo_height + self.gap),
            width: self.photo_width,
            height: self.photo_height,
        }
    }

    /// Band below the last photo that holds the caption
    pub fn caption_area(&self) -> Rect {
        let photos = self.count as u32 * self.photo_height
            + (self.count as u32).saturating_sub(1) * self.gap;
        Rect {
            x: 0,
            y: self.padding + photos,
            width: self.width,
            height: self.caption_band,
        }
    }
}

fn fit(value: u64, what: &str) -> Result<u32, ComposeError> {
    u32::try_from(value)
        .map_err(|_| ComposeError::Canvas(format!("strip {} of {} px is too large", what, value)))
}

fn photo_height(
    photo_width: u32,
    aspect: AspectMode,
    first_frame: Resolution,
) -> Result<u32, ComposeError> {
    let (w, h) = match aspect {
        AspectMode::Fixed { width, height } => (width, height),
        AspectMode::FirstFrame if !first_frame.is_empty() => {
            (first_frame.width, first_frame.height)
        }
        AspectMode::FirstFrame => crate::constants::strip::ASPECT_RATIO,
    };
    if w == 0 || h == 0 {
        return Ok(photo_width);
    }
    let height = (photo_width as u64 * h as u64 + w as u64 / 2) / w as u64;
    fit(height.max(1), "photo height")
}
