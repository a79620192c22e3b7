// SPDX-License-Identifier: GPL-3.0-only

//! Photo booth - countdown captures composed into a photo strip
//!
//! Acquires a camera, runs three countdown/capture cycles and lays the
//! photos out on a decorated vertical strip that can be previewed and saved
//! as PNG.
//!
//! # Architecture
//!
//! - [`app`]: session state machine and the controller that drives it
//! - [`backends`]: camera sources (V4L2, still images, test pattern)
//! - [`pipelines`]: capture, composition and PNG encoding
//! - [`config`]: user configuration handling
//! - [`flash`]: optional hardware flash LEDs
//! - [`terminal`]: interactive terminal surface
//!
//! # Example
//!
//! ```no_run
//! use photobooth::app::{BoothController, Command};
//! use photobooth::backends::camera::SyntheticSource;
//! use photobooth::config::Config;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() {
//! let (events, _event_rx) = mpsc::unbounded_channel();
//! let (commands, command_rx) = mpsc::channel(8);
//! let controller = BoothController::new(SyntheticSource::default(), Config::default(), events);
//! let session = tokio::spawn(controller.run(command_rx));
//! commands.send(Command::Start).await.unwrap();
//! # drop(session);
//! # }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod pipelines;
pub mod terminal;

// Re-export commonly used types
pub use app::{BoothController, BoothEvent, Command, Session, StartRequest};
pub use config::Config;
pub use errors::{SessionError, SessionResult};
