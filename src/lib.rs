//! # Colloquy
//!
//! Colloquy runs turn-based conversations between several LLM-backed participants. Two flows
//! are supported:
//!
//! * **Problem solving**: an orchestrator (the Chief Architect) questions a panel of experts
//!   for a fixed number of iterations, then scores each expert from 0 to 100.
//! * **Debate**: two personas with opposing attitudes take turns on a topic, the initiator
//!   speaking first.
//!
//! The pieces are layered:
//!
//! * [`Session`]: the phase-gated state machine a UI drives with `start`, `advance`,
//!   `evaluate`, `reset` and `save_profile`;
//! * [`TurnDriver`]: picks the next speaker, builds the prompt and walks the speaker's model
//!   fallback chain;
//! * [`Transcript`]: the append-only, gapless log of [`Turn`]s;
//! * [`ClientWrapper`]: the provider seam, implemented for OpenAI in [`clients::openai`].
//!
//! Every generated turn carries the `(AI SIMULATION)` disclosure marker.
//!
//! ```rust,no_run
//! use colloquy::clients::openai::OpenAIClient;
//! use colloquy::profile::consensus_panel;
//! use colloquy::{EngineConfig, Phase, Session, SessionSetup, TurnDriver};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     colloquy::init_logger();
//!     let config = EngineConfig::default();
//!     let client = OpenAIClient::new(&std::env::var(colloquy::config::API_KEY_ENV)?)
//!         .with_max_completion_tokens(config.max_completion_tokens);
//!     let panel = consensus_panel(&config)?;
//!
//!     let mut session = Session::new(TurnDriver::new(Arc::new(client), config));
//!     session
//!         .start(SessionSetup::problem_solving(
//!             "How many ways can 8 rooks be placed on a chessboard without attacking each other?",
//!             panel,
//!         ))
//!         .await?;
//!     while session.phase() == Phase::Running {
//!         session.advance().await?;
//!     }
//!     let evaluation = session.evaluate().await?;
//!     println!("{:?}", evaluation.scores);
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once, driven by `RUST_LOG`.
///
/// ```rust
/// colloquy::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `colloquy` module.
pub mod colloquy;

// Re-exporting key items for easier external access.
pub use colloquy::client_wrapper;
pub use colloquy::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
pub use colloquy::clients;
pub use colloquy::config;
pub use colloquy::config::{CostRates, EngineConfig, FallbackTable};
pub use colloquy::display;
pub use colloquy::error;
pub use colloquy::error::SessionError;
pub use colloquy::evaluation;
pub use colloquy::evaluation::FinalEvaluation;
pub use colloquy::event;
pub use colloquy::event::{EventHandler, ModelEvent, SessionEvent};
pub use colloquy::profile;
pub use colloquy::profile::{Attitude, ParticipantProfile, PersonaSheet};
pub use colloquy::prompts;
pub use colloquy::session;
pub use colloquy::session::{Flow, Phase, Session, SessionSetup};
pub use colloquy::transcript;
pub use colloquy::transcript::{Transcript, Turn, TurnKind};
pub use colloquy::turn_driver;
pub use colloquy::turn_driver::{Completion, TurnDriver};
pub use colloquy::usage;
pub use colloquy::usage::{TurnUsage, UsageSummary};
