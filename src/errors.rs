// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the photo booth

use crate::app::state::PhaseKind;
pub use crate::backends::camera::types::BackendError;

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;

/// Everything that can end a capture session early
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Camera unavailable or permission denied while acquiring
    #[error("camera unavailable: {0}")]
    SourceAcquisition(#[source] BackendError),
    /// Source stopped delivering frames mid-session
    #[error("camera disconnected: {0}")]
    DeviceLost(String),
    /// Strip composition or encoding failed
    #[error("could not create photo strip: {0}")]
    EncodeFailure(#[source] ComposeError),
    /// Writing the strip to disk failed
    #[error("could not save photo strip: {0}")]
    Download(#[source] std::io::Error),
    /// The state machine rejected a step
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Rejected session state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// A session is already running
    #[error("a session is already in progress ({0})")]
    InProgress(PhaseKind),
    /// A strip is ready and the request did not ask for a new session
    #[error("a strip is ready; request a retake to start over")]
    StripReady,
    /// Step not valid from the current phase
    #[error("cannot {event} while {phase}")]
    Invalid {
        phase: PhaseKind,
        event: &'static str,
    },
    /// Frame does not belong to the current countdown cycle
    #[error("captured frame {got} but cycle {expected} is active")]
    OutOfOrder { expected: usize, got: usize },
    /// Strip offered before every frame was captured
    #[error("strip needs {expected} frames, {captured} captured")]
    Incomplete { captured: usize, expected: usize },
}

/// Strip composer and encoder errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    /// Composition refused because the frame count is wrong
    #[error("expected {expected} frames, got {captured}")]
    FrameCount { captured: usize, expected: usize },
    /// A captured frame could not be turned into RGBA
    #[error("frame {index} could not be decoded: {reason}")]
    Decode { index: usize, reason: String },
    /// Canvas allocation or drawing failed
    #[error("canvas error: {0}")]
    Canvas(String),
    /// Caption could not be laid out
    #[error("caption error: {0}")]
    Caption(String),
    /// PNG encoding failed
    #[error("PNG encoding failed: {0}")]
    Encode(String),
    /// A background task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ComposeError {
    fn from(err: tokio::task::JoinError) -> Self {
        ComposeError::Task(err.to_string())
    }
}

impl From<ComposeError> for SessionError {
    fn from(err: ComposeError) -> Self {
        SessionError::EncodeFailure(err)
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration directory on this system")]
    NoConfigDir,
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
