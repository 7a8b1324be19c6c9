//! The session state machine.
//!
//! A [`Session`] owns one conversation: its participants, its [`Transcript`] and its
//! [`Phase`]. Every operation is gated on the current phase:
//!
//! ```text
//! NotStarted --start--> Running --advance (max)--> AwaitingEvaluation --evaluate--> Complete
//!      ^                   |  ^                                                      |
//!      |                   +--+ advance                                              |
//!      +-------------------------- reset (from any phase) --------------------------+
//! ```
//!
//! Debates have no iteration budget and stay in `Running` until reset.
//!
//! Operations that call a model are atomic: new turns are produced on a scratch copy of the
//! transcript and committed only when every call succeeded, so a
//! [`SessionError::ModelUnavailable`] leaves the transcript and phase as they were.
//! [`SessionEvent::TurnAppended`] is reported only for committed turns. Token usage is the
//! exception: every reply the provider billed is counted by [`Session::usage_summary`].
//!
//! # Example
//!
//! ```rust,no_run
//! use colloquy::clients::openai::OpenAIClient;
//! use colloquy::profile::debate_pair;
//! use colloquy::session::SessionSetup;
//! use colloquy::{EngineConfig, Session, TurnDriver};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let client =
//!     OpenAIClient::new("sk-...").with_max_completion_tokens(config.max_completion_tokens);
//! let participants = debate_pair(&config)?;
//! let mut session = Session::new(TurnDriver::new(Arc::new(client), config));
//!
//! session
//!     .start(SessionSetup::debate("Flat tax", participants).with_initiator("bob"))
//!     .await?;
//! for turn in session.advance().await? {
//!     println!("{}: {}", turn.speaker_id, turn.text);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::SessionError;
use crate::evaluation::FinalEvaluation;
use crate::event::{EventHandler, SessionEvent};
use crate::profile::ParticipantProfile;
use crate::transcript::{Transcript, Turn};
use crate::turn_driver::{TurnContext, TurnDriver};
use crate::usage::{TurnUsage, UsageSummary};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle phase of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    NotStarted,
    Running,
    AwaitingEvaluation,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NotStarted => "NotStarted",
            Phase::Running => "Running",
            Phase::AwaitingEvaluation => "AwaitingEvaluation",
            Phase::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// Which conversation is being run, with its flow-specific data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Flow {
    /// Orchestrator plus experts, iterating toward a scored solution. The reference solution
    /// is shown to the orchestrator only.
    ProblemSolving { reference_solution: Option<String> },
    /// Two participants alternating, `initiator_id` speaking first.
    Debate { initiator_id: String },
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Flow::ProblemSolving { .. } => "problem_solving",
            Flow::Debate { .. } => "debate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SetupKind {
    ProblemSolving,
    Debate,
}

/// Arguments of [`Session::start`], built with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    kind: SetupKind,
    topic: String,
    participants: Vec<ParticipantProfile>,
    reference_solution: Option<String>,
    initiator_id: Option<String>,
    max_iterations: Option<usize>,
}

impl SessionSetup {
    /// Problem-solving session on `problem`. Exactly one participant must be an orchestrator.
    pub fn problem_solving(
        problem: impl Into<String>,
        participants: Vec<ParticipantProfile>,
    ) -> Self {
        SessionSetup {
            kind: SetupKind::ProblemSolving,
            topic: problem.into(),
            participants,
            reference_solution: None,
            initiator_id: None,
            max_iterations: None,
        }
    }

    /// Debate on `topic` between exactly two participants.
    pub fn debate(topic: impl Into<String>, participants: Vec<ParticipantProfile>) -> Self {
        SessionSetup {
            kind: SetupKind::Debate,
            topic: topic.into(),
            participants,
            reference_solution: None,
            initiator_id: None,
            max_iterations: None,
        }
    }

    /// Expected solution shown to the orchestrator (problem-solving only).
    pub fn with_reference_solution(mut self, reference_solution: impl Into<String>) -> Self {
        self.reference_solution = Some(reference_solution.into());
        self
    }

    /// Debater who speaks first; defaults to the first participant (debate only).
    pub fn with_initiator(mut self, initiator_id: impl Into<String>) -> Self {
        self.initiator_id = Some(initiator_id.into());
        self
    }

    /// Override the configured iteration budget (problem-solving only).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// One conversation and its phase, driven through `start`, `advance`, `evaluate` and `reset`.
pub struct Session {
    id: String,
    driver: TurnDriver,
    phase: Phase,
    flow: Option<Flow>,
    topic: String,
    participants: Vec<ParticipantProfile>,
    transcript: Transcript,
    iteration_count: usize,
    max_iterations: Option<usize>,
    final_scores: BTreeMap<String, u8>,
    evaluation: Option<FinalEvaluation>,
    saved_profiles: Vec<ParticipantProfile>,
    /// Every billed provider reply since the last start or reset.
    billed_usage: Vec<TurnUsage>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Session {
    /// An idle session in [`Phase::NotStarted`].
    pub fn new(driver: TurnDriver) -> Self {
        Session {
            id: Uuid::new_v4().to_string(),
            driver,
            phase: Phase::NotStarted,
            flow: None,
            topic: String::new(),
            participants: Vec::new(),
            transcript: Transcript::default(),
            iteration_count: 0,
            max_iterations: None,
            final_scores: BTreeMap::new(),
            evaluation: None,
            saved_profiles: Vec::new(),
            billed_usage: Vec::new(),
            event_handler: None,
        }
    }

    /// Register an observer; it is also handed to the driver.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.driver.set_event_handler(Some(handler.clone()));
        self.event_handler = Some(handler);
        self
    }

    async fn emit(&self, event: SessionEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_session_event(&event).await;
        }
    }

    async fn announce_turns(&self, turns: &[Turn]) {
        for turn in turns {
            self.emit(SessionEvent::TurnAppended {
                session_id: self.id.clone(),
                sequence_index: turn.sequence_index,
                speaker_id: turn.speaker_id.clone(),
                model: turn.usage.as_ref().map(|usage| usage.model.clone()),
                text_length: turn.text.len(),
            })
            .await;
        }
    }

    async fn transition(&mut self, to: Phase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        log::info!("Session {}: {} -> {}", self.id, from, to);
        self.emit(SessionEvent::PhaseChanged {
            session_id: self.id.clone(),
            from,
            to,
        })
        .await;
    }

    fn require(&self, operation: &'static str, allowed: &[Phase]) -> Result<(), SessionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            log::warn!("Rejected '{}' in phase {}", operation, self.phase);
            Err(SessionError::IllegalState {
                operation,
                phase: self.phase,
            })
        }
    }

    /// Validate `setup`, bind the participants and move to [`Phase::Running`].
    ///
    /// Only legal from [`Phase::NotStarted`]; call [`Session::reset`] first to start over.
    pub async fn start(&mut self, setup: SessionSetup) -> Result<(), SessionError> {
        self.require("start", &[Phase::NotStarted])?;

        let SessionSetup {
            kind,
            topic,
            participants,
            reference_solution,
            initiator_id,
            max_iterations,
        } = setup;

        let topic = topic.trim().to_string();
        if topic.is_empty() {
            return Err(SessionError::InvalidInput(
                "the problem or topic must not be empty".to_string(),
            ));
        }
        if participants.len() < 2 {
            return Err(SessionError::InvalidInput(
                "at least two participants are required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for participant in &participants {
            if !seen.insert(participant.id()) {
                return Err(SessionError::InvalidInput(format!(
                    "participant id '{}' is used more than once",
                    participant.id()
                )));
            }
        }

        let (flow, max_iterations) = match kind {
            SetupKind::ProblemSolving => {
                if initiator_id.is_some() {
                    return Err(SessionError::InvalidInput(
                        "an initiator only applies to debates".to_string(),
                    ));
                }
                let orchestrators = participants
                    .iter()
                    .filter(|p| p.attitude().is_orchestrator())
                    .count();
                if orchestrators != 1 {
                    return Err(SessionError::InvalidInput(format!(
                        "problem solving needs exactly one orchestrator, found {}",
                        orchestrators
                    )));
                }
                let max = max_iterations.unwrap_or(self.driver.config().max_iterations);
                if max == 0 {
                    return Err(SessionError::InvalidInput(
                        "the iteration budget must be at least 1".to_string(),
                    ));
                }
                let reference_solution = reference_solution
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty());
                (Flow::ProblemSolving { reference_solution }, Some(max))
            }
            SetupKind::Debate => {
                if reference_solution.is_some() || max_iterations.is_some() {
                    return Err(SessionError::InvalidInput(
                        "reference solutions and iteration budgets only apply to problem solving"
                            .to_string(),
                    ));
                }
                if participants.len() != 2 {
                    return Err(SessionError::InvalidInput(format!(
                        "a debate needs exactly two participants, got {}",
                        participants.len()
                    )));
                }
                let initiator_id =
                    initiator_id.unwrap_or_else(|| participants[0].id().to_string());
                if !participants.iter().any(|p| p.id() == initiator_id) {
                    return Err(SessionError::InvalidInput(format!(
                        "initiator '{}' is not a participant",
                        initiator_id
                    )));
                }
                (Flow::Debate { initiator_id }, None)
            }
        };

        self.id = Uuid::new_v4().to_string();
        self.transcript = Transcript::for_participants(&participants);
        self.topic = topic;
        self.participants = participants;
        self.iteration_count = 0;
        self.max_iterations = max_iterations;
        self.final_scores.clear();
        self.evaluation = None;
        self.billed_usage.clear();

        log::info!(
            "Session {} started: {} on '{}' with {} participants",
            self.id,
            flow.name(),
            self.topic,
            self.participants.len()
        );
        self.emit(SessionEvent::Started {
            session_id: self.id.clone(),
            flow: flow.name(),
            topic: self.topic.clone(),
            participant_ids: self.participants.iter().map(|p| p.id().to_string()).collect(),
        })
        .await;
        self.flow = Some(flow);
        self.transition(Phase::Running).await;
        Ok(())
    }

    /// Produce the next step and return the turns it appended.
    ///
    /// Problem-solving: one full iteration, the orchestrator then every expert. Reaching the
    /// iteration budget moves the session to [`Phase::AwaitingEvaluation`].
    /// Debate: exactly one turn from the next speaker.
    pub async fn advance(&mut self) -> Result<Vec<Turn>, SessionError> {
        self.require("advance", &[Phase::Running])?;
        let flow = match &self.flow {
            Some(flow) => flow,
            None => {
                return Err(SessionError::IllegalState {
                    operation: "advance",
                    phase: self.phase,
                })
            }
        };

        let iteration = self.iteration_count + 1;
        let steps = match flow {
            Flow::ProblemSolving { .. } => self.participants.len(),
            Flow::Debate { .. } => 1,
        };

        log::debug!("Session {}: advancing to step {}", self.id, iteration);
        self.emit(SessionEvent::IterationStarted {
            session_id: self.id.clone(),
            iteration,
            max_iterations: self.max_iterations,
        })
        .await;

        let ctx = TurnContext {
            session_id: &self.id,
            flow,
            topic: &self.topic,
            participants: &self.participants,
            iteration,
            max_iterations: self.max_iterations.unwrap_or(0),
        };
        let mut draft = self.transcript.clone();
        let first_new = draft.len();
        for _ in 0..steps {
            self.driver
                .take_turn(&ctx, &mut draft, &mut self.billed_usage)
                .await?;
        }

        let new_turns = draft.turns()[first_new..].to_vec();
        self.transcript = draft;
        self.iteration_count = iteration;
        self.announce_turns(&new_turns).await;

        if let Some(max) = self.max_iterations {
            if self.iteration_count >= max {
                self.transition(Phase::AwaitingEvaluation).await;
            }
        }
        Ok(new_turns)
    }

    /// Ask the orchestrator to score every expert and move to [`Phase::Complete`].
    pub async fn evaluate(&mut self) -> Result<&FinalEvaluation, SessionError> {
        self.require("evaluate", &[Phase::AwaitingEvaluation])?;
        let flow = match &self.flow {
            Some(flow) => flow,
            None => {
                return Err(SessionError::IllegalState {
                    operation: "evaluate",
                    phase: self.phase,
                })
            }
        };

        let ctx = TurnContext {
            session_id: &self.id,
            flow,
            topic: &self.topic,
            participants: &self.participants,
            iteration: self.iteration_count,
            max_iterations: self.max_iterations.unwrap_or(0),
        };
        let mut draft = self.transcript.clone();
        let (verdict, evaluation) = self
            .driver
            .take_evaluation_turn(&ctx, &mut draft, &mut self.billed_usage)
            .await?;

        self.transcript = draft;
        self.announce_turns(std::slice::from_ref(&verdict)).await;
        self.final_scores = evaluation.scores.clone();
        log::info!(
            "Session {} evaluated: {}",
            self.id,
            self.final_scores
                .iter()
                .map(|(id, score)| format!("{}={}", id, score))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.emit(SessionEvent::EvaluationCompleted {
            session_id: self.id.clone(),
            scores: self
                .final_scores
                .iter()
                .map(|(id, score)| (id.clone(), *score))
                .collect(),
            winner: evaluation.winner().map(str::to_string),
        })
        .await;
        self.transition(Phase::Complete).await;
        Ok(&*self.evaluation.insert(evaluation))
    }

    /// Discard the current conversation and return to [`Phase::NotStarted`]. Saved profiles
    /// survive.
    pub async fn reset(&mut self) {
        let previous_id = std::mem::replace(&mut self.id, Uuid::new_v4().to_string());
        self.flow = None;
        self.topic.clear();
        self.participants.clear();
        self.transcript = Transcript::default();
        self.iteration_count = 0;
        self.max_iterations = None;
        self.final_scores.clear();
        self.evaluation = None;
        self.billed_usage.clear();

        log::info!("Session {} reset", previous_id);
        self.emit(SessionEvent::Reset {
            session_id: previous_id,
        })
        .await;
        self.transition(Phase::NotStarted).await;
    }

    /// Store or replace (by id) a profile for the next session. Only legal between sessions.
    pub fn save_profile(&mut self, profile: ParticipantProfile) -> Result<(), SessionError> {
        self.require("save a profile", &[Phase::NotStarted, Phase::Complete])?;
        match self
            .saved_profiles
            .iter_mut()
            .find(|saved| saved.id() == profile.id())
        {
            Some(existing) => *existing = profile,
            None => self.saved_profiles.push(profile),
        }
        Ok(())
    }

    pub fn saved_profiles(&self) -> &[ParticipantProfile] {
        &self.saved_profiles
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn flow(&self) -> Option<&Flow> {
        self.flow.as_ref()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn participants(&self) -> &[ParticipantProfile] {
        &self.participants
    }

    pub fn participant(&self, id: &str) -> Option<&ParticipantProfile> {
        self.participants.iter().find(|p| p.id() == id)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Completed `advance` calls.
    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    /// `None` for debates.
    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    /// Participant id to score; empty until [`Phase::Complete`].
    pub fn final_scores(&self) -> &BTreeMap<String, u8> {
        &self.final_scores
    }

    pub fn evaluation(&self) -> Option<&FinalEvaluation> {
        self.evaluation.as_ref()
    }

    /// Totals over every billed reply, accepted or not, since the last start or reset.
    pub fn usage_summary(&self) -> UsageSummary {
        UsageSummary::total(&self.billed_usage)
    }

    pub fn driver(&self) -> &TurnDriver {
        &self.driver
    }
}
