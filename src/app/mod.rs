// SPDX-License-Identifier: GPL-3.0-only

//! Photo booth application core
//!
//! - `state`: the immutable [`Session`] value and its transitions
//! - `controller`: runs capture sessions and talks to surfaces through
//!   [`Command`]s and [`BoothEvent`]s

pub mod controller;
pub mod state;

pub use controller::{BoothController, BoothEvent, Command};
pub use state::{Phase, PhaseKind, Session, StartRequest};
