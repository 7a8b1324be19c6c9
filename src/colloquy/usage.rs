//! Per-turn token usage and cost estimates, kept for display only.
//!
//! Nothing in the session logic reads these numbers back. Accepted replies carry theirs on
//! the [`Turn`](crate::Turn); the session also keeps every billed reply, including ones that
//! were rejected or belonged to a failed operation, and totals them with [`UsageSummary`].

use crate::client_wrapper::TokenUsage;
use crate::config::CostRates;
use serde::Serialize;

/// Usage recorded for the completion that produced one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnUsage {
    /// Model that actually answered (may be a fallback).
    pub model: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
    /// Estimated USD cost.
    pub estimated_cost: f64,
}

impl TurnUsage {
    pub fn from_token_usage(
        model: impl Into<String>,
        usage: &TokenUsage,
        rates: &CostRates,
    ) -> Self {
        let total_tokens = if usage.total_tokens > 0 {
            usage.total_tokens
        } else {
            usage.input_tokens + usage.output_tokens
        };
        TurnUsage {
            model: model.into(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens,
            estimated_cost: rates.estimate(usage),
        }
    }
}

/// Totals over a set of billed replies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub calls: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
    pub estimated_cost: f64,
}

impl UsageSummary {
    /// Totals over `usages`, one call each.
    pub fn total<'a, I>(usages: I) -> Self
    where
        I: IntoIterator<Item = &'a TurnUsage>,
    {
        usages
            .into_iter()
            .fold(UsageSummary::default(), |mut acc, usage| {
                acc.calls += 1;
                acc.input_tokens += usage.input_tokens;
                acc.output_tokens += usage.output_tokens;
                acc.total_tokens += usage.total_tokens;
                acc.estimated_cost += usage.estimated_cost;
                acc
            })
    }
}
