//! Consensus Engine
//!
//! A Chief Architect questions a Logic Strategist and a Pragmatic Critic for a fixed number of
//! iterations, then scores both experts against an optional reference solution.
//!
//! Run from the root folder of the repo as follows:
//! OPENAI_API_KEY=your-key cargo run --example consensus_engine -- "problem" ["reference solution"]

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use colloquy::clients::openai::OpenAIClient;
use colloquy::config::API_KEY_ENV;
use colloquy::display::{
    format_scoreboard, format_speaker_history, format_usage_summary, summarize_contribution,
};
use colloquy::profile::consensus_panel;
use colloquy::{EngineConfig, Phase, Session, SessionSetup, TurnDriver, TurnKind};

const DEFAULT_PROBLEM: &str = "A factory produces widgets with a 2% defect rate. What is the \
probability that a batch of 50 widgets contains at most one defective widget?";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    colloquy::init_logger();

    let secret_key = env::var(API_KEY_ENV)
        .unwrap_or_else(|_| panic!("Please set the {} environment variable!", API_KEY_ENV));

    let mut args = env::args().skip(1);
    let problem = args.next().unwrap_or_else(|| DEFAULT_PROBLEM.to_string());
    let reference = args.next();

    let config = EngineConfig::default();
    let client = OpenAIClient::new(&secret_key)
        .with_max_completion_tokens(config.max_completion_tokens);
    let panel = consensus_panel(&config)?;
    let mut session = Session::new(TurnDriver::new(Arc::new(client), config));

    let mut setup = SessionSetup::problem_solving(problem, panel);
    if let Some(reference) = reference {
        setup = setup.with_reference_solution(reference);
    }
    if let Err(err) = session.start(setup).await {
        eprintln!("{}", err.user_message());
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("  CONSENSUS ENGINE");
    println!("{}\n", "=".repeat(80));
    println!("Problem: {}\n", session.topic());

    while session.phase() == Phase::Running {
        print!(
            "Running iteration {}/{}... ",
            session.iteration_count() + 1,
            session.max_iterations().unwrap_or(0)
        );
        io::stdout().flush()?;
        match session.advance().await {
            Ok(turns) => println!("{} turns", turns.len()),
            Err(err) => {
                println!();
                eprintln!("{}", err.user_message());
                return Ok(());
            }
        }
    }

    for participant in session.participants() {
        let turns: Vec<_> = session
            .transcript()
            .by_speaker(participant.id())
            .filter(|t| t.kind == TurnKind::Regular)
            .collect();
        println!("\n{}", "-".repeat(80));
        println!("{}\n", format_speaker_history(participant.display_name(), turns.iter().copied()));
        if !participant.attitude().is_orchestrator() {
            println!("Summary: {}", summarize_contribution(&turns));
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("FINAL EVALUATION");
    println!("{}\n", "=".repeat(80));
    let participants = session.participants().to_vec();
    match session.evaluate().await {
        Ok(evaluation) => println!("{}", format_scoreboard(evaluation, &participants)),
        Err(err) => eprintln!("{}", err.user_message()),
    }

    println!("\n{}", format_usage_summary(&session.usage_summary()));
    Ok(())
}
