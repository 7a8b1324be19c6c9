//! The append-only log of turns owned by one session.
//!
//! A [`Transcript`] knows which speakers are allowed to appear in it and hands out sequence
//! indices itself, so the indices are always `0, 1, 2, …` without gaps. Turns are only ever
//! exposed by shared reference.
//!
//! # Example
//!
//! ```rust
//! use colloquy::{Role, Transcript, TurnKind};
//!
//! let mut transcript = Transcript::new(vec!["alice".to_string(), "bob".to_string()]);
//! transcript
//!     .record("bob", Role::Assistant, "(AI SIMULATION) Hello.", TurnKind::Regular, None)
//!     .unwrap();
//! assert_eq!(transcript.len(), 1);
//! assert!(transcript.record("carol", Role::Assistant, "hi", TurnKind::Regular, None).is_err());
//! ```

use crate::client_wrapper::{Message, Role};
use crate::error::SessionError;
use crate::profile::ParticipantProfile;
use crate::usage::TurnUsage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// What a turn was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// Questions, answers and debate lines.
    Regular,
    /// The orchestrator's final scoring reply.
    Evaluation,
}

/// One participant's single contribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub sequence_index: usize,
    pub speaker_id: String,
    pub role: Role,
    pub text: String,
    pub kind: TurnKind,
    pub timestamp: DateTime<Utc>,
    pub usage: Option<TurnUsage>,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    speakers: HashSet<String>,
}

impl Transcript {
    /// Empty transcript accepting turns from `speaker_ids` only.
    pub fn new<I>(speaker_ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Transcript {
            turns: Vec::new(),
            speakers: speaker_ids.into_iter().collect(),
        }
    }

    pub fn for_participants(participants: &[ParticipantProfile]) -> Self {
        Self::new(participants.iter().map(|p| p.id().to_string()))
    }

    /// Index the next appended turn must carry.
    pub fn next_index(&self) -> usize {
        self.turns.len()
    }

    /// Append a fully built turn after checking speaker membership and that its index is
    /// exactly [`Transcript::next_index`].
    pub fn append(&mut self, turn: Turn) -> Result<&Turn, SessionError> {
        if !self.speakers.contains(&turn.speaker_id) {
            return Err(SessionError::InvalidInput(format!(
                "speaker '{}' is not a participant of this session",
                turn.speaker_id
            )));
        }
        if turn.sequence_index != self.next_index() {
            return Err(SessionError::InvalidInput(format!(
                "turn index {} out of order, expected {}",
                turn.sequence_index,
                self.next_index()
            )));
        }
        self.turns.push(turn);
        Ok(&self.turns[self.turns.len() - 1])
    }

    /// Build and append a turn stamped with the next index and the current time.
    pub fn record(
        &mut self,
        speaker_id: &str,
        role: Role,
        text: impl Into<String>,
        kind: TurnKind,
        usage: Option<TurnUsage>,
    ) -> Result<&Turn, SessionError> {
        let turn = Turn {
            sequence_index: self.next_index(),
            speaker_id: speaker_id.to_string(),
            role,
            text: text.into(),
            kind,
            timestamp: Utc::now(),
            usage,
        };
        self.append(turn)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn by_speaker<'a>(&'a self, speaker_id: &'a str) -> impl Iterator<Item = &'a Turn> + 'a {
        self.turns.iter().filter(move |t| t.speaker_id == speaker_id)
    }

    pub fn last_by(&self, speaker_id: &str) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.speaker_id == speaker_id)
    }

    /// Turns of kind [`TurnKind::Regular`].
    pub fn regular_turn_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.kind == TurnKind::Regular)
            .count()
    }

    /// Role-tagged history as seen by `speaker_id`: its own turns become assistant messages,
    /// everybody else's become user messages prefixed with the speaker's display name.
    pub fn render_for(
        &self,
        speaker_id: &str,
        participants: &[ParticipantProfile],
    ) -> Vec<Message> {
        self.turns
            .iter()
            .map(|turn| {
                if turn.speaker_id == speaker_id {
                    Message::assistant(turn.text.clone())
                } else {
                    let name = participants
                        .iter()
                        .find(|p| p.id() == turn.speaker_id)
                        .map(|p| p.display_name())
                        .unwrap_or(turn.speaker_id.as_str());
                    Message::user(format!("{}: {}", name, turn.text))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Attitude;

    fn pair() -> Vec<ParticipantProfile> {
        vec![
            ParticipantProfile::new("a", "Ann", "p", Attitude::Polite, "m").unwrap(),
            ParticipantProfile::new("b", "Ben", "p", Attitude::Adversarial, "m").unwrap(),
        ]
    }

    #[test]
    fn indices_are_gapless() {
        let mut transcript = Transcript::for_participants(&pair());
        for speaker in ["a", "b", "a"].iter() {
            transcript
                .record(speaker, Role::Assistant, "x", TurnKind::Regular, None)
                .unwrap();
        }
        let indices: Vec<usize> = transcript.turns().iter().map(|t| t.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_order_turn_is_rejected() {
        let mut transcript = Transcript::for_participants(&pair());
        let turn = Turn {
            sequence_index: 3,
            speaker_id: "a".into(),
            role: Role::Assistant,
            text: "x".into(),
            kind: TurnKind::Regular,
            timestamp: Utc::now(),
            usage: None,
        };
        assert!(transcript.append(turn).is_err());
        assert!(transcript.is_empty());
    }

    #[test]
    fn render_for_tags_roles_relative_to_speaker() {
        let participants = pair();
        let mut transcript = Transcript::for_participants(&participants);
        transcript
            .record("b", Role::Assistant, "opening", TurnKind::Regular, None)
            .unwrap();
        transcript
            .record("a", Role::Assistant, "reply", TurnKind::Regular, None)
            .unwrap();

        let view = transcript.render_for("a", &participants);
        assert_eq!(view[0], Message::user("Ben: opening"));
        assert_eq!(view[1], Message::assistant("reply"));
    }
}
