//! Parsing of the orchestrator's final verdict.
//!
//! The orchestrator is asked for a JSON object with one `score_agent_N_percent` and one
//! `agent_N_reasoning` per expert (Agent N being the N-th non-orchestrator participant), a
//! `ranking`, a `best_solution_summary` and `evaluation_notes`. Models do not always comply,
//! so recovery is attempted in order:
//!
//! 1. the whole reply as JSON;
//! 2. a fenced ```` ```json ```` block;
//! 3. the first balanced `{…}` block (string and escape aware);
//! 4. field-by-field regex extraction, which also copes with truncated replies.
//!
//! ```rust
//! use colloquy::evaluation::{coerce_score, parse_evaluation_json};
//!
//! let reply = "Verdict:\n```json\n{\"score_agent_1_percent\": \"85%\"}\n```";
//! let value = parse_evaluation_json(reply).unwrap();
//! assert_eq!(coerce_score(&value["score_agent_1_percent"]), Some(85));
//! ```

use crate::profile::{Attitude, ParticipantProfile};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

lazy_static! {
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced json pattern");
    static ref SCORE_FIELD: Regex =
        Regex::new(r#""score_agent_(\d+)_percent"\s*:\s*"?(-?\d+(?:\.\d+)?)"#)
            .expect("score field pattern");
    static ref REASONING_FIELD: Regex =
        Regex::new(r#""agent_(\d+)_reasoning"\s*:\s*"((?:[^"\\]|\\.)*)"#)
            .expect("reasoning field pattern");
    static ref SUMMARY_FIELD: Regex =
        Regex::new(r#""best_solution_summary"\s*:\s*"((?:[^"\\]|\\.)*)"#)
            .expect("summary field pattern");
    static ref NOTES_FIELD: Regex =
        Regex::new(r#""evaluation_notes"\s*:\s*"((?:[^"\\]|\\.)*)"#).expect("notes field pattern");
    static ref RANKING_FIELD: Regex =
        Regex::new(r#"(?s)"ranking"\s*:\s*\[(.*?)\]"#).expect("ranking field pattern");
    static ref QUOTED: Regex = Regex::new(r#""([^"]+)""#).expect("quoted pattern");
    static ref NUMBER: Regex = Regex::new(r"-?\d+(?:\.\d+)?").expect("number pattern");
    static ref AGENT_LABEL: Regex = Regex::new(r"(?i)agent\s*(\d+)").expect("agent label pattern");
}

/// Scores and commentary from the orchestrator, keyed by participant id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalEvaluation {
    /// One entry per expert, each in `0..=100`.
    pub scores: BTreeMap<String, u8>,
    /// Participant ids, best first.
    pub ranking: Vec<String>,
    pub reasoning: BTreeMap<String, String>,
    pub best_solution_summary: String,
    pub evaluation_notes: String,
}

impl FinalEvaluation {
    /// Parse a raw orchestrator reply. `Err` explains why the reply is unusable.
    pub fn from_reply(text: &str, experts: &[&ParticipantProfile]) -> Result<Self, String> {
        let value = parse_evaluation_json(text)
            .ok_or_else(|| "final evaluation reply contains no parseable JSON".to_string())?;
        Self::from_value(&value, experts)
    }

    /// Map `Agent N` fields onto `experts`. Every expert must receive a score.
    pub fn from_value(value: &Value, experts: &[&ParticipantProfile]) -> Result<Self, String> {
        let mut scores = BTreeMap::new();
        let mut reasoning = BTreeMap::new();

        for (idx, expert) in experts.iter().enumerate() {
            let n = idx + 1;
            let score = value
                .get(format!("score_agent_{}_percent", n))
                .and_then(coerce_score)
                .ok_or_else(|| {
                    format!(
                        "final evaluation is missing a score for Agent {} ({})",
                        n,
                        expert.display_name()
                    )
                })?;
            scores.insert(expert.id().to_string(), score);

            if let Some(text) = value
                .get(format!("agent_{}_reasoning", n))
                .and_then(Value::as_str)
            {
                reasoning.insert(expert.id().to_string(), text.to_string());
            }
        }

        let mut ranking: Vec<String> = Vec::new();
        if let Some(labels) = value.get("ranking").and_then(Value::as_array) {
            for label in labels.iter().filter_map(Value::as_str) {
                if let Some(id) = normalize_agent_label(label, experts) {
                    if !ranking.contains(&id) {
                        ranking.push(id);
                    }
                }
            }
        }

        let text_field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(FinalEvaluation {
            scores,
            ranking,
            reasoning,
            best_solution_summary: text_field("best_solution_summary"),
            evaluation_notes: text_field("evaluation_notes"),
        })
    }

    /// First ranked participant, or the highest score when no ranking was given.
    pub fn winner(&self) -> Option<&str> {
        self.ranking.first().map(String::as_str).or_else(|| {
            self.scores
                .iter()
                .max_by_key(|(_, score)| **score)
                .map(|(id, _)| id.as_str())
        })
    }
}

/// Resolve a ranking label ("Agent 2", a display name, an attitude keyword or an id) to a
/// participant id.
pub fn normalize_agent_label(label: &str, experts: &[&ParticipantProfile]) -> Option<String> {
    let normalized = label.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(caps) = AGENT_LABEL.captures(&normalized) {
        if let Ok(n) = caps[1].parse::<usize>() {
            if n >= 1 && n <= experts.len() {
                return Some(experts[n - 1].id().to_string());
            }
        }
    }

    experts
        .iter()
        .find(|e| {
            e.id().to_lowercase() == normalized
                || normalized.contains(&e.display_name().to_lowercase())
        })
        .or_else(|| {
            experts.iter().find(|e| match e.attitude() {
                Attitude::Strategist => {
                    normalized.contains("strategist") || normalized.contains("logic")
                }
                Attitude::Critic => normalized.contains("critic"),
                other => normalized.contains(other.label()),
            })
        })
        .map(|e| e.id().to_string())
}

/// Coerce a JSON score (number or string such as `"85%"`) to an integer in `0..=100`.
pub fn coerce_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned = s.replace('%', "");
            NUMBER.find(&cleaned)?.as_str().parse::<f64>().ok()?
        }
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().max(0.0).min(100.0) as u8)
}

/// Recover the evaluation object from a reply using every strategy in turn.
pub fn parse_evaluation_json(text: &str) -> Option<Value> {
    extract_json_object(text).or_else(|| salvage_fields(text))
}

/// Strategies 1–3: whole reply, fenced block, first balanced brace block.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    for caps in FENCED_JSON.captures_iter(text) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Some(value);
        }
    }

    let start = text.find('{')?;
    let block = balanced_object(text, start)?;
    match serde_json::from_str::<Value>(block) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// The `{…}` block opening at byte `start`, skipping braces inside string literals.
fn balanced_object(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + idx + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw))
        .unwrap_or_else(|_| raw.replace("\\\"", "\"").replace("\\n", "\n"))
}

/// Strategy 4: pull individual fields out of malformed or truncated JSON. Returns `None`
/// unless at least one score was found.
pub fn salvage_fields(text: &str) -> Option<Value> {
    let mut object = Map::new();

    for caps in SCORE_FIELD.captures_iter(text) {
        let key = format!("score_agent_{}_percent", &caps[1]);
        if let Ok(score) = caps[2].parse::<f64>() {
            if let Some(number) = serde_json::Number::from_f64(score) {
                object.entry(key).or_insert(Value::Number(number));
            }
        }
    }
    if object.is_empty() {
        return None;
    }

    for caps in REASONING_FIELD.captures_iter(text) {
        let key = format!("agent_{}_reasoning", &caps[1]);
        object
            .entry(key)
            .or_insert_with(|| Value::String(unescape(&caps[2])));
    }
    if let Some(caps) = SUMMARY_FIELD.captures(text) {
        object.insert(
            "best_solution_summary".into(),
            Value::String(unescape(&caps[1])),
        );
    }
    if let Some(caps) = NOTES_FIELD.captures(text) {
        object.insert("evaluation_notes".into(), Value::String(unescape(&caps[1])));
    }
    if let Some(caps) = RANKING_FIELD.captures(text) {
        let labels = QUOTED
            .captures_iter(&caps[1])
            .map(|label| Value::String(label[1].to_string()))
            .collect::<Vec<_>>();
        if !labels.is_empty() {
            object.insert("ranking".into(), Value::Array(labels));
        }
    }

    Some(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn experts() -> Vec<ParticipantProfile> {
        vec![
            ParticipantProfile::new(
                "strategist",
                "Logic Strategist",
                "p",
                Attitude::Strategist,
                "m",
            )
            .unwrap(),
            ParticipantProfile::new("critic", "Pragmatic Critic", "p", Attitude::Critic, "m")
                .unwrap(),
        ]
    }

    #[test]
    fn plain_json_reply() {
        let value = parse_evaluation_json(r#"{"score_agent_1_percent": 92}"#).unwrap();
        assert_eq!(value["score_agent_1_percent"], json!(92));
    }

    #[test]
    fn balanced_block_ignores_braces_in_strings() {
        let text = concat!(
            r#"Here you go: {"evaluation_notes": "use {x} carefully", "#,
            r#""score_agent_1_percent": 70} thanks"#
        );
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["evaluation_notes"], json!("use {x} carefully"));
    }

    #[test]
    fn truncated_reply_is_salvaged() {
        let text = concat!(
            r#"{"score_agent_1_percent": 88, "score_agent_2_percent": 64, "#,
            r#""ranking": ["Agent 1", "Agent 2"], "best_solution_summary": "Exact binomial calc"#
        );
        let value = parse_evaluation_json(text).unwrap();
        assert_eq!(coerce_score(&value["score_agent_2_percent"]), Some(64));
        assert_eq!(value["best_solution_summary"], json!("Exact binomial calc"));
        assert_eq!(value["ranking"], json!(["Agent 1", "Agent 2"]));
    }

    #[test]
    fn no_scores_means_nothing_salvaged() {
        assert!(parse_evaluation_json("I refuse to answer in JSON").is_none());
    }

    #[test]
    fn scores_are_coerced_and_clamped() {
        assert_eq!(coerce_score(&json!(72.6)), Some(73));
        assert_eq!(coerce_score(&json!("85 %")), Some(85));
        assert_eq!(coerce_score(&json!(140)), Some(100));
        assert_eq!(coerce_score(&json!(-5)), Some(0));
        assert_eq!(coerce_score(&json!("n/a")), None);
        assert_eq!(coerce_score(&json!(null)), None);
    }

    #[test]
    fn ranking_labels_resolve_to_ids() {
        let owned = experts();
        let experts: Vec<&ParticipantProfile> = owned.iter().collect();
        assert_eq!(normalize_agent_label("Agent 2", &experts), Some("critic".into()));
        assert_eq!(
            normalize_agent_label("📐 Logic Strategist", &experts),
            Some("strategist".into())
        );
        assert_eq!(normalize_agent_label("the critic", &experts), Some("critic".into()));
        assert_eq!(normalize_agent_label("Agent 7", &experts), None);
    }

    #[test]
    fn missing_expert_score_is_unusable() {
        let owned = experts();
        let experts: Vec<&ParticipantProfile> = owned.iter().collect();
        let err = FinalEvaluation::from_reply(r#"{"score_agent_1_percent": 90}"#, &experts)
            .unwrap_err();
        assert!(err.contains("Agent 2"));
    }

    #[test]
    fn full_reply_maps_onto_participants() {
        let owned = experts();
        let experts: Vec<&ParticipantProfile> = owned.iter().collect();
        let reply = r#"{"score_agent_1_percent": 90, "score_agent_2_percent": "60%",
            "ranking": ["Agent 1", "Agent 2"], "agent_1_reasoning": "precise",
            "agent_2_reasoning": "vague", "best_solution_summary": "S", "evaluation_notes": "N"}"#;
        let evaluation = FinalEvaluation::from_reply(reply, &experts).unwrap();
        assert_eq!(evaluation.scores["strategist"], 90);
        assert_eq!(evaluation.scores["critic"], 60);
        assert_eq!(evaluation.ranking, vec!["strategist", "critic"]);
        assert_eq!(evaluation.reasoning["critic"], "vague");
        assert_eq!(evaluation.winner(), Some("strategist"));
    }
}
