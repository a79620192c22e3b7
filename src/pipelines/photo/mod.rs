// SPDX-License-Identifier: GPL-3.0-only

//! Photo strip pipeline
//!
//! ```text
//! LiveFeed → Capture ×3 → Decode (joined) → Compose → PNG → Preview / Download
//! ```
//!
//! - [`capture`]: sample the live feed for one countdown cycle
//! - [`layout`]: strip geometry
//! - [`compose`]: paint the strip
//! - [`encoding`]: PNG encoding and saving

pub mod capture;
pub mod compose;
pub mod encoding;
pub mod layout;

pub use capture::{CapturedFrame, PhotoCapture};
pub use compose::StripComposer;
pub use encoding::{ComposedStrip, StripEncoder};
pub use layout::{Rect, StripLayout};
