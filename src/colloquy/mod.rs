// src/colloquy/mod.rs

pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod display;
pub mod error;
pub mod evaluation;
pub mod event;
pub mod profile;
pub mod prompts;
pub mod session;
pub mod transcript;
pub mod turn_driver;
pub mod usage;

// Export the session types so callers can write colloquy::Session instead of
// colloquy::session::Session
pub use session::{Flow, Phase, Session, SessionSetup};
pub use turn_driver::TurnDriver;
