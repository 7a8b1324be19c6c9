//! Errors returned by session operations.
//!
//! # Examples
//!
//! ```
//! use colloquy::{Phase, SessionError};
//!
//! let err = SessionError::IllegalState { operation: "advance", phase: Phase::Complete };
//! assert_eq!(err.to_string(), "Illegal state: cannot advance while Complete");
//! assert!(err.user_message().contains("unexpected state"));
//! ```

use crate::session::Phase;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Bad construction or start arguments. Correctable by the user and shown verbatim.
    InvalidInput(String),

    /// An operation was invoked in a phase where it is not legal. Indicates a bug in the
    /// driving UI, which should have checked [`Session::phase`](crate::Session::phase).
    IllegalState {
        operation: &'static str,
        phase: Phase,
    },

    /// Every model in the speaker's chain (preferred model plus fallbacks) failed.
    ModelUnavailable {
        speaker_id: String,
        attempted_models: Vec<String>,
        last_error: String,
    },
}

impl SessionError {
    /// Text a UI shell shows to the person clicking the button.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::InvalidInput(msg) => msg.clone(),
            SessionError::IllegalState { .. } => {
                "The session is in an unexpected state. Reset it and try again.".to_string()
            }
            SessionError::ModelUnavailable {
                attempted_models, ..
            } => format!(
                "No model could answer (tried: {}). Please retry in a moment.",
                attempted_models.join(", ")
            ),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            SessionError::IllegalState { operation, phase } => {
                write!(f, "Illegal state: cannot {} while {}", operation, phase)
            }
            SessionError::ModelUnavailable {
                speaker_id,
                attempted_models,
                last_error,
            } => write!(
                f,
                "Model unavailable for '{}' after trying [{}]: {}",
                speaker_id,
                attempted_models.join(", "),
                last_error
            ),
        }
    }
}

impl Error for SessionError {}
