// SPDX-License-Identifier: GPL-3.0-only

//! Session state machine
//!
//! A [`Session`] is an immutable value. Every step of the capture flow is a
//! method that checks the current [`Phase`] and returns the next session, or
//! a [`TransitionError`] when the step does not apply.
//!
//! ```text
//! Idle ──begin──► Acquiring ──acquired──► Counting(i, 3..0)
//!   ▲                 │                       │ tick at 0
//!   │           acquire_failed                ▼
//!   │                 │                   Capturing(i)
//!   ├─────────────────┘                       │ captured
//!   │                               i+1 < N   ▼   i+1 == N
//!   │                 Counting(i+1) ◄── Pausing(i)    Composing ──composed──► Ready
//!   │                                                                        │
//!   └────────────────────── cancel / abort (from anywhere) ◄─────────────────┘
//! ```

use crate::constants::{PHOTO_COUNT, timing};
use crate::errors::TransitionError;
use crate::pipelines::photo::{CapturedFrame, ComposedStrip};
use uuid::Uuid;

/// Phase of a session without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Idle,
    Acquiring,
    Counting,
    Capturing,
    Pausing,
    Composing,
    Ready,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PhaseKind::Idle => "idle",
            PhaseKind::Acquiring => "acquiring the camera",
            PhaseKind::Counting => "counting down",
            PhaseKind::Capturing => "capturing",
            PhaseKind::Pausing => "pausing",
            PhaseKind::Composing => "composing",
            PhaseKind::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Where the session is in the capture flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not started; the start control is enabled
    #[default]
    Idle,
    /// Waiting for the camera source
    Acquiring,
    /// Countdown for frame `index` showing `seconds_left`
    Counting { index: usize, seconds_left: u32 },
    /// Countdown finished, frame `index` is being taken
    Capturing { index: usize },
    /// Frame `index` taken, waiting before the next countdown
    Pausing { index: usize },
    /// All frames taken, strip being built
    Composing,
    /// Strip built and downloadable
    Ready,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::Acquiring => PhaseKind::Acquiring,
            Phase::Counting { .. } => PhaseKind::Counting,
            Phase::Capturing { .. } => PhaseKind::Capturing,
            Phase::Pausing { .. } => PhaseKind::Pausing,
            Phase::Composing => PhaseKind::Composing,
            Phase::Ready => PhaseKind::Ready,
        }
    }

    /// A capture flow is running (start requests are ignored)
    pub fn in_progress(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Ready)
    }
}

/// Kind of start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRequest {
    /// Plain start; ignored while a strip is ready
    Initial,
    /// Explicit new session that discards a ready strip
    Retake,
}

/// One capture run
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    phase: Phase,
    target_count: usize,
    countdown_from: u32,
    frames: Vec<CapturedFrame>,
    strip: Option<ComposedStrip>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(timing::COUNTDOWN_FROM)
    }
}

impl Session {
    /// Empty, not-started session
    pub fn new(countdown_from: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Idle,
            target_count: PHOTO_COUNT,
            countdown_from,
            frames: Vec::new(),
            strip: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn photos_taken(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    pub fn strip(&self) -> Option<&ComposedStrip> {
        self.strip.as_ref()
    }

    /// Strip finalized for this session and downloadable
    pub fn ready(&self) -> bool {
        self.phase == Phase::Ready && self.strip.is_some()
    }

    fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    fn invalid(&self, event: &'static str) -> TransitionError {
        TransitionError::Invalid {
            phase: self.phase.kind(),
            event,
        }
    }

    /// Start a new capture run
    ///
    /// Replaces this session with a fresh one (new id, no frames, no strip)
    /// waiting for the camera.
    pub fn begin(&self, request: StartRequest) -> Result<Self, TransitionError> {
        match (self.phase, request) {
            (phase, _) if phase.in_progress() => Err(TransitionError::InProgress(phase.kind())),
            (Phase::Ready, StartRequest::Initial) => Err(TransitionError::StripReady),
            _ => Ok(Self {
                phase: Phase::Acquiring,
                ..Self::new(self.countdown_from)
            }),
        }
    }

    /// Camera is live; first countdown starts
    pub fn acquired(&self) -> Result<Self, TransitionError> {
        match self.phase {
            Phase::Acquiring => Ok(self.with_phase(Phase::Counting {
                index: 0,
                seconds_left: self.countdown_from,
            })),
            _ => Err(self.invalid("finish acquiring")),
        }
    }

    /// Camera could not be opened; back to not-started
    pub fn acquire_failed(&self) -> Result<Self, TransitionError> {
        match self.phase {
            Phase::Acquiring => Ok(self.with_phase(Phase::Idle)),
            _ => Err(self.invalid("fail acquiring")),
        }
    }

    /// One countdown step elapsed
    pub fn tick(&self) -> Result<Self, TransitionError> {
        match self.phase {
            Phase::Counting {
                index,
                seconds_left: 0,
            } => Ok(self.with_phase(Phase::Capturing { index })),
            Phase::Counting {
                index,
                seconds_left,
            } => Ok(self.with_phase(Phase::Counting {
                index,
                seconds_left: seconds_left - 1,
            })),
            _ => Err(self.invalid("tick")),
        }
    }

    /// Store the frame for the active cycle
    pub fn captured(&self, frame: CapturedFrame) -> Result<Self, TransitionError> {
        let Phase::Capturing { index } = self.phase else {
            return Err(self.invalid("store a frame"));
        };
        if frame.index != index || self.frames.len() != index {
            return Err(TransitionError::OutOfOrder {
                expected: index,
                got: frame.index,
            });
        }

        let mut frames = self.frames.clone();
        frames.push(frame);
        let phase = if frames.len() < self.target_count {
            Phase::Pausing { index }
        } else {
            Phase::Composing
        };
        Ok(Self {
            phase,
            frames,
            ..self.clone()
        })
    }

    /// Pause after a capture elapsed; next countdown starts
    pub fn pause_elapsed(&self) -> Result<Self, TransitionError> {
        match self.phase {
            Phase::Pausing { index } => Ok(self.with_phase(Phase::Counting {
                index: index + 1,
                seconds_left: self.countdown_from,
            })),
            _ => Err(self.invalid("end the pause")),
        }
    }

    /// Attach the finished strip
    pub fn composed(&self, strip: ComposedStrip) -> Result<Self, TransitionError> {
        if self.phase != Phase::Composing {
            return Err(self.invalid("attach a strip"));
        }
        if self.frames.len() != self.target_count {
            return Err(TransitionError::Incomplete {
                captured: self.frames.len(),
                expected: self.target_count,
            });
        }
        Ok(Self {
            phase: Phase::Ready,
            strip: Some(strip),
            ..self.clone()
        })
    }

    /// Drop everything and return to not-started
    ///
    /// Valid from every phase. Used for cancel, device loss and encode
    /// failure alike.
    pub fn cancel(&self) -> Self {
        Self {
            phase: Phase::Idle,
            frames: Vec::new(),
            strip: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{CameraFrame, Resolution};
    use std::sync::Arc;

    fn frame(index: usize) -> CapturedFrame {
        CapturedFrame::new(
            index,
            Arc::new(CameraFrame::from_rgba(1, 1, vec![0, 0, 0, 255], index as u64)),
            Resolution::new(1, 1),
        )
    }

    fn strip() -> ComposedStrip {
        ComposedStrip {
            png: Arc::from(vec![1u8, 2, 3]),
            width: 1,
            height: 1,
        }
    }

    fn count_down(mut session: Session) -> Session {
        while matches!(session.phase(), Phase::Counting { .. }) {
            session = session.tick().unwrap();
        }
        session
    }

    fn run_to_composing() -> Session {
        let mut session = Session::default()
            .begin(StartRequest::Initial)
            .unwrap()
            .acquired()
            .unwrap();
        for i in 0..PHOTO_COUNT {
            session = count_down(session);
            assert_eq!(session.phase(), Phase::Capturing { index: i });
            session = session.captured(frame(i)).unwrap();
            assert_eq!(session.photos_taken(), i + 1);
            if i + 1 < PHOTO_COUNT {
                session = session.pause_elapsed().unwrap();
            }
        }
        session
    }

    #[test]
    fn test_countdown_shows_three_to_zero() {
        let mut session = Session::default()
            .begin(StartRequest::Initial)
            .unwrap()
            .acquired()
            .unwrap();
        let mut shown = Vec::new();
        while let Phase::Counting { seconds_left, .. } = session.phase() {
            shown.push(seconds_left);
            session = session.tick().unwrap();
        }
        assert_eq!(shown, vec![3, 2, 1, 0]);
        assert_eq!(session.phase(), Phase::Capturing { index: 0 });
    }

    #[test]
    fn test_full_run_reaches_ready() {
        let session = run_to_composing();
        assert_eq!(session.phase(), Phase::Composing);
        assert!(!session.ready());

        let ready = session.composed(strip()).unwrap();
        assert!(ready.ready());
        let order: Vec<usize> = ready.frames().iter().map(|f| f.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_transitions_return_new_values() {
        let idle = Session::default();
        let acquiring = idle.begin(StartRequest::Initial).unwrap();
        assert_eq!(idle.phase(), Phase::Idle);
        assert_eq!(acquiring.phase(), Phase::Acquiring);
        assert_ne!(idle.id(), acquiring.id());
    }

    #[test]
    fn test_start_ignored_while_running_or_ready() {
        let running = Session::default().begin(StartRequest::Initial).unwrap();
        assert_eq!(
            running.begin(StartRequest::Retake).unwrap_err(),
            TransitionError::InProgress(PhaseKind::Acquiring)
        );

        let ready = run_to_composing().composed(strip()).unwrap();
        assert_eq!(
            ready.begin(StartRequest::Initial).unwrap_err(),
            TransitionError::StripReady
        );

        let retake = ready.begin(StartRequest::Retake).unwrap();
        assert_eq!(retake.photos_taken(), 0);
        assert!(retake.strip().is_none());
        assert!(!retake.ready());
    }

    #[test]
    fn test_frames_never_exceed_target() {
        let composing = run_to_composing();
        assert!(composing.captured(frame(3)).is_err());
        assert_eq!(composing.photos_taken(), PHOTO_COUNT);
    }

    #[test]
    fn test_out_of_order_frame_rejected() {
        let capturing = count_down(
            Session::default()
                .begin(StartRequest::Initial)
                .unwrap()
                .acquired()
                .unwrap(),
        );
        assert_eq!(
            capturing.captured(frame(1)).unwrap_err(),
            TransitionError::OutOfOrder {
                expected: 0,
                got: 1
            }
        );
    }

    #[test]
    fn test_compose_outside_composing_is_rejected() {
        let counting = Session::default()
            .begin(StartRequest::Initial)
            .unwrap()
            .acquired()
            .unwrap();
        assert!(matches!(
            counting.composed(strip()),
            Err(TransitionError::Invalid {
                phase: PhaseKind::Counting,
                ..
            })
        ));

        let ready = run_to_composing().composed(strip()).unwrap();
        assert!(ready.composed(strip()).is_err());
    }

    #[test]
    fn test_cancel_from_every_phase() {
        let ready = run_to_composing().composed(strip()).unwrap();
        for session in [
            Session::default(),
            Session::default().begin(StartRequest::Initial).unwrap(),
            run_to_composing(),
            ready,
        ] {
            let cancelled = session.cancel();
            assert_eq!(cancelled.phase(), Phase::Idle);
            assert_eq!(cancelled.photos_taken(), 0);
            assert!(!cancelled.ready());
            assert!(cancelled.begin(StartRequest::Initial).is_ok());
        }
    }

    #[test]
    fn test_failed_acquisition_returns_to_idle() {
        let session = Session::default()
            .begin(StartRequest::Initial)
            .unwrap()
            .acquire_failed()
            .unwrap();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.photos_taken(), 0);
    }
}
