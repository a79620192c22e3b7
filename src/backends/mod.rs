// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Capture Session Controller          │
//! └────────────────────┬────────────────────────┘
//!                      │  CameraSource::acquire
//! ┌────────────────────┴────────────────────────┐
//! │  ┌──────────┐  ┌─────────────┐  ┌────────┐  │
//! │  │   V4L2   │  │ Still files │  │Pattern │  │
//! │  └──────────┘  └─────────────┘  └────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`camera`]: camera sources and the live feed they hand out

pub mod camera;
