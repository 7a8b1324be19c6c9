use async_trait::async_trait;
use colloquy::client_wrapper::{ClientError, ClientWrapper, Message, Role};
use colloquy::profile::{debate_pair, PersonaSheet};
use colloquy::{Attitude, EngineConfig, Phase, Session, SessionError, SessionSetup, TurnDriver};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Replays canned replies and records what every call saw.
struct ScriptedDebateClient {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedDebateClient {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ClientWrapper for ScriptedDebateClient {
    async fn send_message(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<Message, ClientError> {
        self.calls
            .lock()
            .await
            .push((model.to_string(), messages.to_vec()));
        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "I disagree.".to_string());
        Ok(Message::assistant(reply))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

fn session_with(client: Arc<ScriptedDebateClient>) -> Session {
    Session::new(TurnDriver::new(client, EngineConfig::default()))
}

#[tokio::test]
async fn initiator_opens_and_speakers_alternate() {
    let client = Arc::new(ScriptedDebateClient::new(&[
        "Hello Alice, let us talk taxes.",
        "Your numbers are wrong.",
        "Here are the official figures.",
        "Still wrong.",
    ]));
    let config = EngineConfig::default();
    let mut session = session_with(client.clone());
    session
        .start(
            SessionSetup::debate("Flat tax", debate_pair(&config).unwrap()).with_initiator("bob"),
        )
        .await
        .unwrap();
    assert_eq!(session.max_iterations(), None);

    for _ in 0..4 {
        let turns = session.advance().await.unwrap();
        assert_eq!(turns.len(), 1);
    }

    let speakers: Vec<&str> = session
        .transcript()
        .turns()
        .iter()
        .map(|t| t.speaker_id.as_str())
        .collect();
    assert_eq!(speakers, vec!["bob", "alice", "bob", "alice"]);
    assert_eq!(session.phase(), Phase::Running);
    assert_eq!(session.iteration_count(), 4);
    assert_eq!(
        session.transcript().turns()[0].text,
        "(AI SIMULATION) Hello Alice, let us talk taxes."
    );
}

#[tokio::test]
async fn first_participant_opens_by_default() {
    let client = Arc::new(ScriptedDebateClient::new(&["Opening."]));
    let config = EngineConfig::default();
    let mut session = session_with(client);
    session
        .start(SessionSetup::debate("Flat tax", debate_pair(&config).unwrap()))
        .await
        .unwrap();
    let turns = session.advance().await.unwrap();
    assert_eq!(turns[0].speaker_id, "alice");
}

#[tokio::test]
async fn only_the_first_turn_gets_the_opening_directive() {
    let client = Arc::new(ScriptedDebateClient::new(&["Hi.", "No."]));
    let config = EngineConfig::default();
    let mut session = session_with(client.clone());
    session
        .start(
            SessionSetup::debate("Flat tax", debate_pair(&config).unwrap()).with_initiator("bob"),
        )
        .await
        .unwrap();
    session.advance().await.unwrap();
    session.advance().await.unwrap();

    let calls = client.calls.lock().await.clone();
    let opening = |messages: &[Message]| {
        messages
            .iter()
            .any(|m| &*m.content == "Open the debate on: Flat tax")
    };
    assert!(opening(&calls[0].1));
    assert!(calls[0].1[0].content.contains("FIRST MESSAGE"));
    assert!(!opening(&calls[1].1));

    let alice_view = &calls[1].1;
    assert_eq!(alice_view[0].role, Role::System);
    assert_eq!(alice_view[1].role, Role::User);
    assert_eq!(&*alice_view[1].content, "Bob: (AI SIMULATION) Hi.");
    assert_eq!(calls[1].0, "gpt-4o");
}

#[tokio::test]
async fn already_marked_replies_are_not_stamped_twice() {
    let client = Arc::new(ScriptedDebateClient::new(&["(AI SIMULATION) I am an AI alter ego."]));
    let config = EngineConfig::default();
    let mut session = session_with(client);
    session
        .start(SessionSetup::debate("Flat tax", debate_pair(&config).unwrap()))
        .await
        .unwrap();
    let turns = session.advance().await.unwrap();
    assert_eq!(turns[0].text, "(AI SIMULATION) I am an AI alter ego.");
}

#[tokio::test]
async fn blank_reply_falls_back_to_next_model() {
    let client = Arc::new(ScriptedDebateClient::new(&["   ", "A real answer."]));
    let participants = vec![
        PersonaSheet::alice()
            .into_profile("alice", Attitude::Adversarial, "m1")
            .unwrap()
            .with_fallback_models(vec!["m2".into()]),
        PersonaSheet::bob()
            .into_profile("bob", Attitude::Polite, "m1")
            .unwrap(),
    ];
    let mut session = session_with(client.clone());
    session
        .start(SessionSetup::debate("Flat tax", participants))
        .await
        .unwrap();

    let turns = session.advance().await.unwrap();
    assert_eq!(turns[0].text, "(AI SIMULATION) A real answer.");
    let models: Vec<String> = client
        .calls
        .lock()
        .await
        .iter()
        .map(|(m, _)| m.clone())
        .collect();
    assert_eq!(models, vec!["m1", "m2"]);
}

#[tokio::test]
async fn debates_cannot_be_evaluated() {
    let client = Arc::new(ScriptedDebateClient::new(&[]));
    let config = EngineConfig::default();
    let mut session = session_with(client);
    session
        .start(SessionSetup::debate("Flat tax", debate_pair(&config).unwrap()))
        .await
        .unwrap();
    session.advance().await.unwrap();
    assert!(matches!(
        session.evaluate().await,
        Err(SessionError::IllegalState {
            operation: "evaluate",
            phase: Phase::Running
        })
    ));
}

#[tokio::test]
async fn debate_setup_is_validated() {
    let config = EngineConfig::default();
    let mut session = session_with(Arc::new(ScriptedDebateClient::new(&[])));

    let unknown_initiator =
        SessionSetup::debate("Flat tax", debate_pair(&config).unwrap()).with_initiator("carol");
    assert!(matches!(
        session.start(unknown_initiator).await,
        Err(SessionError::InvalidInput(_))
    ));

    let mut crowd = debate_pair(&config).unwrap();
    crowd.push(
        PersonaSheet::bob()
            .into_profile("bob2", Attitude::Polite, "gpt-4o")
            .unwrap(),
    );
    assert!(matches!(
        session.start(SessionSetup::debate("Flat tax", crowd)).await,
        Err(SessionError::InvalidInput(_))
    ));

    let with_reference = SessionSetup::debate("Flat tax", debate_pair(&config).unwrap())
        .with_reference_solution("no");
    assert!(matches!(
        session.start(with_reference).await,
        Err(SessionError::InvalidInput(_))
    ));
    assert_eq!(session.phase(), Phase::NotStarted);
}
