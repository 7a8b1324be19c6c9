//! Participant profiles: who speaks, in which voice, on which model.
//!
//! A [`ParticipantProfile`] is one record for every kind of speaker; behaviour differences come
//! from the enumerated [`Attitude`] rather than from separate types. Profiles validate on
//! construction and are immutable afterwards; edits happen by building a new profile and
//! saving it between sessions with [`Session::save_profile`](crate::Session::save_profile).
//!
//! # Example
//!
//! ```rust
//! use colloquy::{Attitude, ParticipantProfile};
//!
//! let critic = ParticipantProfile::new(
//!     "critic",
//!     "Pragmatic Critic",
//!     "Skeptical reviewer who demands numbers.",
//!     Attitude::Critic,
//!     "gpt-4o-mini",
//! )
//! .unwrap()
//! .with_fallback_models(vec!["gpt-3.5-turbo".into()]);
//!
//! assert_eq!(critic.model_chain(), vec!["gpt-4o-mini", "gpt-3.5-turbo"]);
//! ```

use crate::config::EngineConfig;
use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Voice a participant speaks in.
///
/// `Adversarial` and `Polite` are debate stances; `Chief`, `Strategist` and `Critic` are the
/// archetypes of the problem-solving panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attitude {
    Adversarial,
    Polite,
    Chief,
    Strategist,
    Critic,
}

impl Attitude {
    /// The orchestrator asks questions and scores everybody else.
    pub fn is_orchestrator(&self) -> bool {
        matches!(self, Attitude::Chief)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Attitude::Adversarial => "adversarial",
            Attitude::Polite => "polite",
            Attitude::Chief => "chief",
            Attitude::Strategist => "strategist",
            Attitude::Critic => "critic",
        }
    }
}

impl fmt::Display for Attitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Static description of a speaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantProfile {
    id: String,
    display_name: String,
    persona_description: String,
    attitude: Attitude,
    preferred_model_id: String,
    fallback_model_ids: Vec<String>,
}

impl ParticipantProfile {
    /// Build a profile. Fails with [`SessionError::InvalidInput`] when the id, display name,
    /// persona description or preferred model is blank.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        persona_description: impl Into<String>,
        attitude: Attitude,
        preferred_model_id: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let profile = ParticipantProfile {
            id: id.into(),
            display_name: display_name.into(),
            persona_description: persona_description.into(),
            attitude,
            preferred_model_id: preferred_model_id.into(),
            fallback_model_ids: Vec::new(),
        };

        let required = [
            ("id", &profile.id),
            ("display_name", &profile.display_name),
            ("persona_description", &profile.persona_description),
            ("preferred_model_id", &profile.preferred_model_id),
        ];
        for (field, value) in required.iter() {
            if value.trim().is_empty() {
                return Err(SessionError::InvalidInput(format!(
                    "participant {} must not be empty",
                    field
                )));
            }
        }

        Ok(profile)
    }

    /// Attach the ordered fallback chain (builder pattern, creation time only).
    pub fn with_fallback_models(mut self, fallback_model_ids: Vec<String>) -> Self {
        self.fallback_model_ids = fallback_model_ids
            .into_iter()
            .filter(|model| !model.trim().is_empty())
            .collect();
        self
    }

    /// Fill the fallback chain from the configured [`FallbackTable`](crate::FallbackTable).
    pub fn with_configured_fallbacks(self, config: &EngineConfig) -> Self {
        let chain = config.fallbacks.chain_for(&self.preferred_model_id);
        self.with_fallback_models(chain)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn persona_description(&self) -> &str {
        &self.persona_description
    }

    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    pub fn preferred_model_id(&self) -> &str {
        &self.preferred_model_id
    }

    pub fn fallback_model_ids(&self) -> &[String] {
        &self.fallback_model_ids
    }

    /// Preferred model followed by the fallbacks, each model at most once.
    pub fn model_chain(&self) -> Vec<&str> {
        let mut chain: Vec<&str> = Vec::with_capacity(1 + self.fallback_model_ids.len());
        for model in std::iter::once(&self.preferred_model_id).chain(&self.fallback_model_ids) {
            if !chain.contains(&model.as_str()) {
                chain.push(model);
            }
        }
        chain
    }
}

/// Form-style persona used by the debate shell; rendered into a persona description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSheet {
    pub name: String,
    pub gender: String,
    pub characteristics: String,
    pub attitudes: String,
    pub hobbies: String,
    pub personality: String,
    pub interests: String,
    pub background: String,
}

impl PersonaSheet {
    pub fn alice() -> Self {
        PersonaSheet {
            name: "Alice".into(),
            gender: "female".into(),
            characteristics: "Analytical, measured, principled; open to dialogue but hard to move."
                .into(),
            attitudes: "Progressive, environmentalist, collaborative, idealistic.".into(),
            hobbies: "Cinema, indie-rock piano and guitar, retro games, reading.".into(),
            personality: "Private, articulate, empathetic; calm tone with radical content.".into(),
            interests: "Civil rights, climate justice, migration, economic inequality.".into(),
            background: "Law graduate and former policy analyst in social advocacy.".into(),
        }
    }

    pub fn bob() -> Self {
        PersonaSheet {
            name: "Bob".into(),
            gender: "male".into(),
            characteristics: "Charismatic, blunt, tenacious, self-ironic.".into(),
            attitudes: "Conservative, traditionalist, pragmatic, combative.".into(),
            hobbies: "Fantasy novels, fitness, amateur singing.".into(),
            personality: "Extroverted, decisive, resilient, politically sharp.".into(),
            interests: "National identity, geopolitics, security, economic policy.".into(),
            background: "Business graduate and former strategy consultant.".into(),
        }
    }

    pub fn pronouns(&self) -> &'static str {
        match self.gender.trim().to_lowercase().as_str() {
            "female" => "she/her",
            "male" => "he/him",
            _ => "they/them",
        }
    }

    /// One `Field: value` line per attribute.
    pub fn render(&self) -> String {
        [
            format!("Gender: {} ({})", self.gender, self.pronouns()),
            format!("Characteristics: {}", self.characteristics),
            format!("Attitudes: {}", self.attitudes),
            format!("Hobbies: {}", self.hobbies),
            format!("Personality: {}", self.personality),
            format!("Interests: {}", self.interests),
            format!("Background: {}", self.background),
        ]
        .join("\n")
    }

    /// Turn the sheet into a debate profile speaking with `attitude` on `model`.
    pub fn into_profile(
        self,
        id: impl Into<String>,
        attitude: Attitude,
        model: impl Into<String>,
    ) -> Result<ParticipantProfile, SessionError> {
        let persona = self.render();
        ParticipantProfile::new(id, self.name, persona, attitude, model)
    }
}

/// Chief Architect, Logic Strategist and Pragmatic Critic on the configured models.
pub fn consensus_panel(config: &EngineConfig) -> Result<Vec<ParticipantProfile>, SessionError> {
    Ok(vec![
        ParticipantProfile::new(
            "chief",
            "Chief Architect",
            "Orchestrator of the panel. Steers the experts with short, targeted questions and \
             delivers the final verdict.",
            Attitude::Chief,
            config.chief_model.clone(),
        )?
        .with_configured_fallbacks(config),
        ParticipantProfile::new(
            "strategist",
            "Logic Strategist",
            "Works from first principles: abstractions, step-by-step algorithms and \
             mathematical models, without emotional colouring.",
            Attitude::Strategist,
            config.strategist_model.clone(),
        )?
        .with_configured_fallbacks(config),
        ParticipantProfile::new(
            "critic",
            "Pragmatic Critic",
            "Skeptical validator. Hunts for flaws, edge cases, hidden costs and arithmetic \
             mistakes, and demands concrete numbers.",
            Attitude::Critic,
            config.critic_model.clone(),
        )?
        .with_configured_fallbacks(config),
    ])
}

/// Alice (adversarial) and Bob (polite) on the configured debate model.
pub fn debate_pair(config: &EngineConfig) -> Result<Vec<ParticipantProfile>, SessionError> {
    Ok(vec![
        PersonaSheet::alice()
            .into_profile("alice", Attitude::Adversarial, config.debate_model.clone())?
            .with_configured_fallbacks(config),
        PersonaSheet::bob()
            .into_profile("bob", Attitude::Polite, config.debate_model.clone())?
            .with_configured_fallbacks(config),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_display_name_is_rejected() {
        let err = ParticipantProfile::new("x", "  ", "persona", Attitude::Polite, "gpt-4o")
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidInput("participant display_name must not be empty".into())
        );
    }

    #[test]
    fn blank_persona_is_rejected() {
        assert!(ParticipantProfile::new("x", "X", "", Attitude::Polite, "gpt-4o").is_err());
    }

    #[test]
    fn model_chain_skips_duplicates() {
        let profile = ParticipantProfile::new("x", "X", "p", Attitude::Chief, "gpt-4.1")
            .unwrap()
            .with_fallback_models(vec![
                "gpt-4.1".into(),
                "gpt-4o".into(),
                "".into(),
                "gpt-4o".into(),
            ]);
        assert_eq!(profile.model_chain(), vec!["gpt-4.1", "gpt-4o"]);
    }

    #[test]
    fn presets_pick_up_config_fallbacks() {
        let config = EngineConfig::default();
        let panel = consensus_panel(&config).unwrap();
        assert_eq!(panel.len(), 3);
        assert!(panel[0].attitude().is_orchestrator());
        assert_eq!(panel[0].fallback_model_ids(), &["gpt-4o", "gpt-4o-mini"]);

        let pair = debate_pair(&config).unwrap();
        assert_eq!(pair[0].display_name(), "Alice");
        assert!(pair[1].persona_description().contains("he/him"));
    }
}
