// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! Heavy work (frame conversion, composition, encoding) runs on the blocking
//! pool so countdown timing and the live preview stay responsive.
//!
//! - [`photo`]: capture stills and turn them into a photo strip

pub mod photo;
