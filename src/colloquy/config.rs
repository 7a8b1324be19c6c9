//! Configuration for colloquy sessions.
//!
//! Provides [`EngineConfig`], the knobs a UI shell hands to the
//! [`TurnDriver`](crate::TurnDriver): iteration budget, reply length cap, cost rates, the
//! per-role default models and the [`FallbackTable`] consulted when a model is unavailable.
//! Users construct it in code; there is no config file.
//!
//! # Example
//!
//! ```rust
//! use colloquy::{EngineConfig, FallbackTable};
//!
//! let config = EngineConfig {
//!     max_iterations: 5,
//!     fallbacks: FallbackTable::empty().with_chain("my-model", vec!["my-model-small".into()]),
//!     ..EngineConfig::default()
//! };
//! assert_eq!(config.fallbacks.chain_for("my-model"), vec!["my-model-small".to_string()]);
//! ```

use crate::client_wrapper::TokenUsage;
use crate::clients::openai::{model_to_string, Model};

/// Environment variable the demo shells read the API key from.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Prefix stamped on every generated turn.
pub const SIMULATION_MARKER: &str = "(AI SIMULATION)";

/// Number of orchestrator/expert iterations before the problem-solving flow asks for scores.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Reply length cap forwarded to the provider.
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 200;

/// USD prices used to estimate the cost of a turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRates {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl CostRates {
    /// Estimated cost of a single completion.
    ///
    /// ```rust
    /// use colloquy::CostRates;
    /// use colloquy::client_wrapper::TokenUsage;
    ///
    /// let rates = CostRates { input_per_million: 2.5, output_per_million: 10.0 };
    /// let usage = TokenUsage {
    ///     input_tokens: 1_000_000,
    ///     output_tokens: 100_000,
    ///     total_tokens: 1_100_000,
    /// };
    /// assert!((rates.estimate(&usage) - 3.5).abs() < 1e-9);
    /// ```
    pub fn estimate(&self, usage: &TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (usage.output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for CostRates {
    fn default() -> Self {
        CostRates {
            input_per_million: 2.50,
            output_per_million: 10.00,
        }
    }
}

/// Ordered mapping from a model id to the models tried after it fails.
///
/// Lookup prefers an exact key and otherwise the longest key `k` such that the model id starts
/// with `"{k}-"`, so dated snapshots such as `gpt-4o-2024-08-06` inherit the `gpt-4o` chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackTable {
    chains: Vec<(String, Vec<String>)>,
}

impl FallbackTable {
    pub fn empty() -> Self {
        FallbackTable { chains: Vec::new() }
    }

    /// Register (or replace) the chain for `model` (builder pattern).
    pub fn with_chain(mut self, model: impl Into<String>, fallbacks: Vec<String>) -> Self {
        let model = model.into();
        match self.chains.iter_mut().find(|(key, _)| *key == model) {
            Some(entry) => entry.1 = fallbacks,
            None => self.chains.push((model, fallbacks)),
        }
        self
    }

    /// Fallback models for `model`, excluding `model` itself. Empty when nothing matches.
    pub fn chain_for(&self, model: &str) -> Vec<String> {
        let exact = self.chains.iter().find(|(key, _)| key == model);
        let matched = exact.or_else(|| {
            self.chains
                .iter()
                .filter(|(key, _)| model.starts_with(&format!("{}-", key)))
                .max_by_key(|(key, _)| key.len())
        });

        matched
            .map(|(_, fallbacks)| {
                fallbacks
                    .iter()
                    .filter(|candidate| candidate.as_str() != model)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Global configuration for a turn driver and the sessions it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Iterations in the problem-solving flow before evaluation is required.
    pub max_iterations: usize,
    /// Reply length cap handed to provider clients.
    pub max_completion_tokens: u32,
    /// Prices used for the per-turn cost estimate.
    pub cost_rates: CostRates,
    /// Model fallback chains.
    pub fallbacks: FallbackTable,
    /// Disclosure prefix stamped on generated text.
    pub simulation_marker: String,
    /// Default model for the orchestrator (Chief Architect).
    pub chief_model: String,
    /// Default model for the Logic Strategist.
    pub strategist_model: String,
    /// Default model for the Pragmatic Critic.
    pub critic_model: String,
    /// Default model for both debaters.
    pub debate_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let fallbacks = FallbackTable::empty()
            .with_chain(
                model_to_string(Model::GPT41),
                vec![
                    model_to_string(Model::GPT4o),
                    model_to_string(Model::GPT4oMini),
                ],
            )
            .with_chain(
                model_to_string(Model::GPT4o),
                vec![
                    model_to_string(Model::GPT4oMini),
                    model_to_string(Model::GPT35Turbo),
                ],
            )
            .with_chain(
                model_to_string(Model::GPT41Nano20250414),
                vec![
                    model_to_string(Model::GPT4oMini),
                    model_to_string(Model::GPT35Turbo),
                ],
            )
            .with_chain(
                model_to_string(Model::GPT4oMini),
                vec![model_to_string(Model::GPT35Turbo)],
            );

        EngineConfig {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            cost_rates: CostRates::default(),
            fallbacks,
            simulation_marker: SIMULATION_MARKER.to_string(),
            chief_model: model_to_string(Model::GPT41),
            strategist_model: model_to_string(Model::GPT4o),
            critic_model: model_to_string(Model::GPT41Nano20250414),
            debate_model: model_to_string(Model::GPT4o),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_key_wins_over_prefix() {
        let config = EngineConfig::default();
        // "gpt-4.1-nano-2025-04-14" also starts with "gpt-4.1-"
        assert_eq!(
            config.fallbacks.chain_for("gpt-4.1-nano-2025-04-14"),
            vec!["gpt-4o-mini".to_string(), "gpt-3.5-turbo".to_string()]
        );
    }

    #[test]
    fn dated_snapshot_inherits_longest_prefix() {
        let config = EngineConfig::default();
        assert_eq!(
            config.fallbacks.chain_for("gpt-4o-mini-2024-07-18"),
            vec!["gpt-3.5-turbo".to_string()]
        );
        assert_eq!(
            config.fallbacks.chain_for("gpt-4o-2024-08-06"),
            vec!["gpt-4o-mini".to_string(), "gpt-3.5-turbo".to_string()]
        );
    }

    #[test]
    fn unknown_model_has_no_fallbacks() {
        let config = EngineConfig::default();
        assert!(config.fallbacks.chain_for("claude-sonnet").is_empty());
    }

    #[test]
    fn chain_never_repeats_the_model_itself() {
        let table = FallbackTable::empty()
            .with_chain("a", vec!["a".into(), "b".into()])
            .with_chain("a", vec!["a".into(), "c".into()]);
        assert_eq!(table.chain_for("a"), vec!["c".to_string()]);
    }
}
