//! Turn production: who speaks next, what the model sees, and which model answers.
//!
//! A [`TurnDriver`] is stateless between calls. Each turn it
//!
//! 1. picks the next speaker from the transcript alone ([`TurnDriver::next_speaker`]);
//! 2. assembles the messages for that speaker: system prompt, the transcript rendered from
//!    the speaker's point of view, and a trailing instruction;
//! 3. walks the speaker's model chain until one model returns a non-empty, acceptable reply;
//! 4. stamps the simulation marker on the reply and appends it to the transcript.
//!
//! The driver never commits anything on its own: the [`Session`](crate::Session) hands it a
//! scratch copy of the transcript and keeps it only when every call in an operation succeeded.

use crate::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::evaluation::FinalEvaluation;
use crate::event::{EventHandler, ModelEvent};
use crate::profile::ParticipantProfile;
use crate::prompts;
use crate::session::Flow;
use crate::transcript::{Transcript, Turn, TurnKind};
use crate::usage::TurnUsage;
use std::sync::Arc;

/// A reply accepted from one model of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// The model that actually answered.
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Read-only view of the session a turn is produced for.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub session_id: &'a str,
    pub flow: &'a Flow,
    pub topic: &'a str,
    pub participants: &'a [ParticipantProfile],
    /// 1-based iteration being produced.
    pub iteration: usize,
    pub max_iterations: usize,
}

/// The participant with an orchestrator attitude, if any.
pub fn orchestrator(participants: &[ParticipantProfile]) -> Option<&ParticipantProfile> {
    participants.iter().find(|p| p.attitude().is_orchestrator())
}

/// Every non-orchestrator in participant order. Agent N is `experts(..)[N - 1]`.
pub fn experts(participants: &[ParticipantProfile]) -> Vec<&ParticipantProfile> {
    participants
        .iter()
        .filter(|p| !p.attitude().is_orchestrator())
        .collect()
}

/// Speaking order of one problem-solving iteration: orchestrator first, then the experts.
pub fn rotation(participants: &[ParticipantProfile]) -> Vec<&ParticipantProfile> {
    orchestrator(participants)
        .into_iter()
        .chain(experts(participants))
        .collect()
}

/// Produces turns for a [`Session`](crate::Session) over a shared [`ClientWrapper`].
pub struct TurnDriver {
    client: Arc<dyn ClientWrapper>,
    config: EngineConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl TurnDriver {
    pub fn new(client: Arc<dyn ClientWrapper>, config: EngineConfig) -> Self {
        TurnDriver {
            client,
            config,
            event_handler: None,
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub(crate) fn set_event_handler(&mut self, handler: Option<Arc<dyn EventHandler>>) {
        self.event_handler = handler;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    async fn emit_model(&self, event: ModelEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_model_event(&event).await;
        }
    }

    /// Who speaks next, derived from the transcript only.
    ///
    /// Problem-solving rotates orchestrator, then experts in order, counting regular turns.
    /// Debates open with the initiator and then alternate.
    pub fn next_speaker<'p>(
        &self,
        ctx: &TurnContext<'p>,
        transcript: &Transcript,
    ) -> Option<&'p ParticipantProfile> {
        match ctx.flow {
            Flow::ProblemSolving { .. } => {
                let order = rotation(ctx.participants);
                if order.is_empty() {
                    return None;
                }
                Some(order[transcript.regular_turn_count() % order.len()])
            }
            Flow::Debate { initiator_id } => match transcript.last() {
                None => ctx.participants.iter().find(|p| p.id() == initiator_id),
                Some(last) => ctx.participants.iter().find(|p| p.id() != last.speaker_id),
            },
        }
    }

    /// Messages sent to the provider for `speaker`'s next regular turn.
    pub fn assemble_messages(
        &self,
        ctx: &TurnContext<'_>,
        transcript: &Transcript,
        speaker: &ParticipantProfile,
    ) -> Vec<Message> {
        let history = transcript.render_for(speaker.id(), ctx.participants);

        match ctx.flow {
            Flow::ProblemSolving { reference_solution } => {
                let experts = experts(ctx.participants);
                let (system, instruction) = if speaker.attitude().is_orchestrator() {
                    let system = prompts::orchestrator_system_prompt(
                        speaker,
                        &experts,
                        ctx.topic,
                        ctx.max_iterations,
                    );
                    let instruction = if ctx.iteration <= 1 {
                        prompts::opening_question(
                            ctx.topic,
                            reference_solution.as_deref(),
                            &experts,
                        )
                    } else {
                        let latest: Vec<(&str, &str)> = experts
                            .iter()
                            .filter_map(|e| {
                                transcript
                                    .last_by(e.id())
                                    .map(|t| (e.display_name(), t.text.as_str()))
                            })
                            .collect();
                        prompts::follow_up_directive(
                            ctx.topic,
                            reference_solution.as_deref(),
                            &latest,
                            ctx.iteration,
                            ctx.max_iterations,
                        )
                    };
                    (system, instruction)
                } else {
                    let chief_name = orchestrator(ctx.participants)
                        .map(|c| c.display_name())
                        .unwrap_or("the orchestrator");
                    let earlier = replies_since_orchestrator(ctx.participants, transcript, speaker);
                    (
                        prompts::expert_system_prompt(speaker, ctx.topic),
                        prompts::expert_directive(speaker, chief_name, &earlier),
                    )
                };

                let mut messages = Vec::with_capacity(history.len() + 2);
                messages.push(Message::system(system));
                messages.extend(history);
                messages.push(Message::user(instruction));
                messages
            }
            Flow::Debate { .. } => {
                let mut messages = Vec::with_capacity(history.len() + 2);
                messages.push(Message::system(prompts::debate_system_prompt(
                    speaker,
                    ctx.topic,
                    &self.config.simulation_marker,
                )));
                if history.is_empty() {
                    messages.push(Message::user(prompts::debate_opening(ctx.topic)));
                }
                messages.extend(history);
                messages
            }
        }
    }

    /// Messages asking the orchestrator for the final verdict.
    pub fn assemble_evaluation_messages(
        &self,
        ctx: &TurnContext<'_>,
        transcript: &Transcript,
        chief: &ParticipantProfile,
    ) -> Vec<Message> {
        let experts = experts(ctx.participants);
        let reference = match ctx.flow {
            Flow::ProblemSolving { reference_solution } => reference_solution.as_deref(),
            Flow::Debate { .. } => None,
        };
        let contributions: Vec<(&ParticipantProfile, Vec<&str>)> = experts
            .iter()
            .map(|expert| {
                let turns = transcript
                    .by_speaker(expert.id())
                    .filter(|t| t.kind == TurnKind::Regular)
                    .map(|t| t.text.as_str())
                    .collect();
                (*expert, turns)
            })
            .collect();

        let mut messages = vec![Message::system(prompts::orchestrator_system_prompt(
            chief,
            &experts,
            ctx.topic,
            ctx.max_iterations,
        ))];
        messages.extend(transcript.render_for(chief.id(), ctx.participants));
        messages.push(Message::user(prompts::final_evaluation_brief(
            ctx.topic,
            reference,
            &contributions,
        )));
        messages
    }

    /// Try each model of `speaker`'s chain once, in order, until one returns a non-empty reply.
    ///
    /// Usage of every reply the provider returned, accepted or not, is pushed onto `billed`.
    pub async fn complete(
        &self,
        speaker: &ParticipantProfile,
        messages: &[Message],
        billed: &mut Vec<TurnUsage>,
    ) -> Result<Completion, SessionError> {
        self.complete_with(speaker, messages, billed, |_| Ok(()))
            .await
            .map(|(completion, _)| completion)
    }

    /// Like [`TurnDriver::complete`], but a reply must also pass `accept`. A rejected reply
    /// counts as a failed attempt and moves on to the next model.
    pub async fn complete_with<T, F>(
        &self,
        speaker: &ParticipantProfile,
        messages: &[Message],
        billed: &mut Vec<TurnUsage>,
        accept: F,
    ) -> Result<(Completion, T), SessionError>
    where
        F: Fn(&str) -> Result<T, String>,
    {
        let chain = speaker.model_chain();
        let mut attempted_models = Vec::with_capacity(chain.len());
        let mut last_error = String::from("no model configured");

        for (idx, model) in chain.iter().enumerate() {
            attempted_models.push(model.to_string());
            log::debug!(
                "Calling {} model '{}' for '{}' (attempt {}/{})",
                self.client.provider_name(),
                model,
                speaker.id(),
                idx + 1,
                chain.len()
            );
            self.emit_model(ModelEvent::CallStarted {
                speaker_id: speaker.id().to_string(),
                model: model.to_string(),
                attempt: idx + 1,
            })
            .await;

            let outcome = match self.client.send_message(model, messages).await {
                Ok(reply) => {
                    let usage = self.client.get_last_usage().await;
                    if let Some(usage) = &usage {
                        billed.push(TurnUsage::from_token_usage(
                            model.to_string(),
                            usage,
                            &self.config.cost_rates,
                        ));
                    }
                    let text = reply.content.trim().to_string();
                    if text.is_empty() {
                        Err(format!("model '{}' returned an empty reply", model))
                    } else {
                        accept(&text).map(|accepted| (text, accepted, usage))
                    }
                }
                Err(err) => Err(err.to_string()),
            };

            match outcome {
                Ok((text, accepted, usage)) => {
                    self.emit_model(ModelEvent::CallCompleted {
                        speaker_id: speaker.id().to_string(),
                        model: model.to_string(),
                        response_length: text.len(),
                        tokens_used: usage.clone(),
                    })
                    .await;
                    let completion = Completion {
                        text,
                        model: model.to_string(),
                        usage,
                    };
                    return Ok((completion, accepted));
                }
                Err(reason) => {
                    let falling_back = idx + 1 < chain.len();
                    if falling_back {
                        log::warn!(
                            "Model '{}' failed for '{}', falling back to '{}': {}",
                            model,
                            speaker.id(),
                            chain[idx + 1],
                            reason
                        );
                    }
                    self.emit_model(ModelEvent::CallFailed {
                        speaker_id: speaker.id().to_string(),
                        model: model.to_string(),
                        error: reason.clone(),
                        falling_back,
                    })
                    .await;
                    last_error = reason;
                }
            }
        }

        log::error!(
            "No model answered for '{}' (tried: {}): {}",
            speaker.id(),
            attempted_models.join(", "),
            last_error
        );
        Err(SessionError::ModelUnavailable {
            speaker_id: speaker.id().to_string(),
            attempted_models,
            last_error,
        })
    }

    /// Produce the next regular turn and append it to `transcript`.
    pub async fn take_turn(
        &self,
        ctx: &TurnContext<'_>,
        transcript: &mut Transcript,
        billed: &mut Vec<TurnUsage>,
    ) -> Result<Turn, SessionError> {
        let speaker = self.next_speaker(ctx, transcript).ok_or_else(|| {
            SessionError::InvalidInput("no participant is able to speak next".to_string())
        })?;
        let messages = self.assemble_messages(ctx, transcript, speaker);
        let completion = self.complete(speaker, &messages, billed).await?;
        self.append_completion(ctx, transcript, speaker, completion, TurnKind::Regular)
    }

    /// Ask the orchestrator for the verdict, append it as an evaluation turn and return the
    /// parsed scores. Replies that cannot be parsed fall through to the next model.
    pub async fn take_evaluation_turn(
        &self,
        ctx: &TurnContext<'_>,
        transcript: &mut Transcript,
        billed: &mut Vec<TurnUsage>,
    ) -> Result<(Turn, FinalEvaluation), SessionError> {
        let chief = orchestrator(ctx.participants).ok_or_else(|| {
            SessionError::InvalidInput("evaluation requires an orchestrator".to_string())
        })?;
        let experts = experts(ctx.participants);
        let messages = self.assemble_evaluation_messages(ctx, transcript, chief);

        let (completion, evaluation) = self
            .complete_with(chief, &messages, billed, |text| {
                FinalEvaluation::from_reply(text, &experts)
            })
            .await?;

        let turn =
            self.append_completion(ctx, transcript, chief, completion, TurnKind::Evaluation)?;
        Ok((turn, evaluation))
    }

    /// Stamp and append to `transcript`. Observers hear about the turn from the session once
    /// it is committed.
    fn append_completion(
        &self,
        ctx: &TurnContext<'_>,
        transcript: &mut Transcript,
        speaker: &ParticipantProfile,
        completion: Completion,
        kind: TurnKind,
    ) -> Result<Turn, SessionError> {
        let usage = completion.usage.as_ref().map(|usage| {
            TurnUsage::from_token_usage(completion.model.as_str(), usage, &self.config.cost_rates)
        });
        let text = prompts::stamp_simulation(&completion.text, &self.config.simulation_marker);
        let turn = transcript
            .record(speaker.id(), Role::Assistant, text, kind, usage)?
            .clone();

        log::debug!(
            "Session {}: drafted turn #{} by '{}' via '{}' ({} chars)",
            ctx.session_id,
            turn.sequence_index,
            turn.speaker_id,
            completion.model,
            turn.text.len()
        );
        Ok(turn)
    }
}

/// Replies from other experts after the orchestrator's most recent regular turn.
fn replies_since_orchestrator<'t>(
    participants: &'t [ParticipantProfile],
    transcript: &'t Transcript,
    speaker: &ParticipantProfile,
) -> Vec<(&'t str, &'t str)> {
    let turns = transcript.turns();
    let start = turns
        .iter()
        .rposition(|t| {
            t.kind == TurnKind::Regular
                && participants
                    .iter()
                    .any(|p| p.id() == t.speaker_id && p.attitude().is_orchestrator())
        })
        .map(|idx| idx + 1)
        .unwrap_or(0);

    turns[start..]
        .iter()
        .filter(|t| t.kind == TurnKind::Regular && t.speaker_id != speaker.id())
        .filter_map(|t| {
            participants
                .iter()
                .find(|p| p.id() == t.speaker_id)
                .map(|p| (p.display_name(), t.text.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_wrapper::ClientError;
    use crate::profile::Attitude;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl ClientWrapper for Silent {
        async fn send_message(
            &self,
            _model: &str,
            _messages: &[Message],
        ) -> Result<Message, ClientError> {
            Ok(Message::assistant("ok"))
        }

        fn provider_name(&self) -> &str {
            "silent"
        }
    }

    fn panel() -> Vec<ParticipantProfile> {
        vec![
            ParticipantProfile::new("s", "Strategist", "p", Attitude::Strategist, "m").unwrap(),
            ParticipantProfile::new("c", "Chief", "p", Attitude::Chief, "m").unwrap(),
            ParticipantProfile::new("k", "Critic", "p", Attitude::Critic, "m").unwrap(),
        ]
    }

    #[test]
    fn rotation_puts_orchestrator_first() {
        let participants = panel();
        let ids: Vec<&str> = rotation(&participants).iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["c", "s", "k"]);
    }

    #[test]
    fn problem_solving_speaker_follows_regular_turn_count() {
        let participants = panel();
        let flow = Flow::ProblemSolving {
            reference_solution: None,
        };
        let ctx = TurnContext {
            session_id: "t",
            flow: &flow,
            topic: "P",
            participants: &participants,
            iteration: 1,
            max_iterations: 3,
        };
        let driver = TurnDriver::new(Arc::new(Silent), EngineConfig::default());
        let mut transcript = Transcript::for_participants(&participants);
        assert_eq!(driver.next_speaker(&ctx, &transcript).unwrap().id(), "c");
        transcript
            .record("c", Role::Assistant, "q", TurnKind::Regular, None)
            .unwrap();
        assert_eq!(driver.next_speaker(&ctx, &transcript).unwrap().id(), "s");
    }

    #[test]
    fn critic_sees_earlier_replies_of_the_iteration() {
        let participants = panel();
        let mut transcript = Transcript::for_participants(&participants);
        for (id, text) in [("c", "q1"), ("s", "a1"), ("k", "b1"), ("c", "q2"), ("s", "a2")].iter() {
            transcript
                .record(id, Role::Assistant, *text, TurnKind::Regular, None)
                .unwrap();
        }
        let earlier = replies_since_orchestrator(&participants, &transcript, &participants[2]);
        assert_eq!(earlier, vec![("Strategist", "a2")]);
    }

    #[test]
    fn debate_opening_directive_only_without_history() {
        let participants = vec![
            ParticipantProfile::new("a", "Alice", "p", Attitude::Adversarial, "m").unwrap(),
            ParticipantProfile::new("b", "Bob", "p", Attitude::Polite, "m").unwrap(),
        ];
        let flow = Flow::Debate {
            initiator_id: "b".into(),
        };
        let ctx = TurnContext {
            session_id: "t",
            flow: &flow,
            topic: "Taxes",
            participants: &participants,
            iteration: 1,
            max_iterations: 0,
        };
        let driver = TurnDriver::new(Arc::new(Silent), EngineConfig::default());
        let transcript = Transcript::for_participants(&participants);
        let messages = driver.assemble_messages(&ctx, &transcript, &participants[1]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], Message::user("Open the debate on: Taxes"));
    }
}
