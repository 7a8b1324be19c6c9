//! Debate Simulator
//!
//! Two AI alter egos, Alice (adversarial) and Bob (polite), debate a topic turn by turn.
//! Bob opens. Model fallbacks are reported as they happen.
//!
//! Run from the root folder of the repo as follows:
//! OPENAI_API_KEY=your-key cargo run --example debate_simulator -- "topic" [turns]

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use colloquy::clients::openai::OpenAIClient;
use colloquy::config::API_KEY_ENV;
use colloquy::event::{EventHandler, ModelEvent};
use colloquy::profile::debate_pair;
use colloquy::{EngineConfig, Session, SessionSetup, TurnDriver};

const DEFAULT_TOPIC: &str = "Should income above one million per year be taxed at 70%?";
const DEFAULT_TURNS: usize = 6;

struct FallbackReporter;

#[async_trait]
impl EventHandler for FallbackReporter {
    async fn on_model_event(&self, event: &ModelEvent) {
        if let ModelEvent::CallFailed {
            speaker_id,
            model,
            falling_back: true,
            ..
        } = event
        {
            eprintln!("  [{} is unavailable for {}, trying the next model]", model, speaker_id);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    colloquy::init_logger();

    let secret_key = env::var(API_KEY_ENV)
        .unwrap_or_else(|_| panic!("Please set the {} environment variable!", API_KEY_ENV));

    let mut args = env::args().skip(1);
    let topic = args.next().unwrap_or_else(|| DEFAULT_TOPIC.to_string());
    let turns = args
        .next()
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(DEFAULT_TURNS);

    let config = EngineConfig::default();
    let client = OpenAIClient::new(&secret_key)
        .with_max_completion_tokens(config.max_completion_tokens);
    let pair = debate_pair(&config)?;
    let mut session = Session::new(TurnDriver::new(Arc::new(client), config))
        .with_event_handler(Arc::new(FallbackReporter));

    if let Err(err) = session
        .start(SessionSetup::debate(topic, pair).with_initiator("bob"))
        .await
    {
        eprintln!("{}", err.user_message());
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("  DEBATE: {}", session.topic());
    println!("{}\n", "=".repeat(80));

    for _ in 0..turns {
        match session.advance().await {
            Ok(new_turns) => {
                for turn in new_turns {
                    let name = session
                        .participant(&turn.speaker_id)
                        .map(|p| p.display_name().to_string())
                        .unwrap_or_else(|| turn.speaker_id.clone());
                    println!("{}:\n{}\n", name, turn.text);
                }
            }
            Err(err) => {
                eprintln!("{}", err.user_message());
                break;
            }
        }
    }

    let usage = session.usage_summary();
    println!(
        "{} turns, {} tokens, estimated cost ${:.4}",
        session.transcript().len(),
        usage.total_tokens,
        usage.estimated_cost
    );
    session.reset().await;
    Ok(())
}
