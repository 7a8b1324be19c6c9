//! Session and model-call event system.
//!
//! Implement [`EventHandler`] to observe a [`Session`](crate::Session) as it runs. Events are
//! split in two streams:
//!
//! - [`ModelEvent`]s from the [`TurnDriver`](crate::TurnDriver), one per provider attempt
//!   (including the fallback hops);
//! - [`SessionEvent`]s from the session itself: start, iterations, appended turns, phase
//!   changes, evaluation and reset.
//!
//! Both handler methods default to no-ops. The handler is shared as `Arc<dyn EventHandler>`;
//! registering it on a session with
//! [`Session::with_event_handler`](crate::Session::with_event_handler) also hands it to the
//! session's driver.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use colloquy::event::{EventHandler, ModelEvent, SessionEvent};
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_session_event(&self, event: &SessionEvent) {
//!         if let SessionEvent::TurnAppended { speaker_id, sequence_index, .. } = event {
//!             println!("#{} {}", sequence_index, speaker_id);
//!         }
//!     }
//!     async fn on_model_event(&self, event: &ModelEvent) {
//!         if let ModelEvent::CallFailed { model, error, .. } = event {
//!             eprintln!("{} failed: {}", model, error);
//!         }
//!     }
//! }
//! ```

use crate::client_wrapper::TokenUsage;
use crate::session::Phase;
use async_trait::async_trait;

/// Events emitted by a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// `start` succeeded.
    Started {
        session_id: String,
        /// `"problem_solving"` or `"debate"`.
        flow: &'static str,
        topic: String,
        participant_ids: Vec<String>,
    },
    /// An `advance` call began. For debates `iteration` counts turns.
    IterationStarted {
        session_id: String,
        iteration: usize,
        max_iterations: Option<usize>,
    },
    /// A turn was committed to the transcript.
    TurnAppended {
        session_id: String,
        sequence_index: usize,
        speaker_id: String,
        model: Option<String>,
        text_length: usize,
    },
    PhaseChanged {
        session_id: String,
        from: Phase,
        to: Phase,
    },
    /// The orchestrator's verdict was parsed; scores keyed by participant id.
    EvaluationCompleted {
        session_id: String,
        scores: Vec<(String, u8)>,
        winner: Option<String>,
    },
    /// The session returned to `NotStarted`.
    Reset { session_id: String },
}

/// Events emitted by the [`TurnDriver`](crate::TurnDriver) around provider calls.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// About to call `model` for `speaker_id`. `attempt` is 1-based within the chain.
    CallStarted {
        speaker_id: String,
        model: String,
        attempt: usize,
    },
    /// The provider produced an acceptable reply.
    CallCompleted {
        speaker_id: String,
        model: String,
        response_length: usize,
        tokens_used: Option<TokenUsage>,
    },
    /// The attempt failed; `falling_back` tells whether another model will be tried.
    CallFailed {
        speaker_id: String,
        model: String,
        error: String,
        falling_back: bool,
    },
}

/// Receiver for [`SessionEvent`]s and [`ModelEvent`]s.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_session_event(&self, _event: &SessionEvent) {}

    async fn on_model_event(&self, _event: &ModelEvent) {}
}
