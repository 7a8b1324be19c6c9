//! Markdown renderings used by the demo shells.

use crate::evaluation::FinalEvaluation;
use crate::profile::ParticipantProfile;
use crate::transcript::Turn;
use crate::usage::UsageSummary;

const CONTRIBUTION_SUMMARY_CHARS: usize = 200;

/// `### Name - Step i` sections, one per turn, separated by rules.
pub fn format_speaker_history<'a, I>(display_name: &str, turns: I) -> String
where
    I: IntoIterator<Item = &'a Turn>,
{
    turns
        .into_iter()
        .enumerate()
        .map(|(idx, turn)| format!("### {} - Step {}\n\n{}", display_name, idx + 1, turn.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn format_usage_summary(summary: &UsageSummary) -> String {
    format!(
        "**Model calls:** {}\n**Input tokens:** {}\n**Output tokens:** {}\n\
         **Total tokens:** {}\n**Estimated cost:** ${:.4}",
        summary.calls,
        group_thousands(summary.input_tokens),
        group_thousands(summary.output_tokens),
        group_thousands(summary.total_tokens),
        summary.estimated_cost
    )
}

/// The last two turns joined, cut to 200 characters with a trailing `...`.
pub fn summarize_contribution(turns: &[&Turn]) -> String {
    if turns.is_empty() {
        return "No contributions recorded.".to_string();
    }
    let start = turns.len().saturating_sub(2);
    let joined = turns[start..]
        .iter()
        .map(|t| t.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.chars().count() <= CONTRIBUTION_SUMMARY_CHARS {
        joined
    } else {
        let cut: String = joined.chars().take(CONTRIBUTION_SUMMARY_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Ranked score table followed by the summary and notes.
pub fn format_scoreboard(
    evaluation: &FinalEvaluation,
    participants: &[ParticipantProfile],
) -> String {
    let name_of = |id: &str| {
        participants
            .iter()
            .find(|p| p.id() == id)
            .map(|p| p.display_name().to_string())
            .unwrap_or_else(|| id.to_string())
    };

    let mut order: Vec<&String> = evaluation
        .ranking
        .iter()
        .filter(|id| evaluation.scores.contains_key(id.as_str()))
        .collect();
    let mut rest: Vec<&String> = evaluation
        .scores
        .keys()
        .filter(|id| !order.contains(id))
        .collect();
    rest.sort_by(|a, b| evaluation.scores[*b].cmp(&evaluation.scores[*a]));
    order.extend(rest);

    let mut table = String::from("| Rank | Participant | Score | Reasoning |\n|---|---|---|---|\n");
    for (idx, id) in order.iter().enumerate() {
        let reasoning = evaluation
            .reasoning
            .get(id.as_str())
            .map(|r| r.replace('\n', " ").replace('|', "/"))
            .unwrap_or_default();
        table.push_str(&format!(
            "| {} | {} | {}% | {} |\n",
            idx + 1,
            name_of(id.as_str()),
            evaluation.scores[id.as_str()],
            reasoning
        ));
    }

    if !evaluation.best_solution_summary.is_empty() {
        table.push_str(&format!(
            "\n**Best solution:** {}\n",
            evaluation.best_solution_summary
        ));
    }
    if !evaluation.evaluation_notes.is_empty() {
        table.push_str(&format!("\n**Notes:** {}\n", evaluation.evaluation_notes));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_wrapper::Role;
    use crate::transcript::TurnKind;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn turn(text: &str) -> Turn {
        Turn {
            sequence_index: 0,
            speaker_id: "s".into(),
            role: Role::Assistant,
            text: text.into(),
            kind: TurnKind::Regular,
            timestamp: Utc::now(),
            usage: None,
        }
    }

    #[test]
    fn history_sections_are_numbered() {
        let turns = vec![turn("one"), turn("two")];
        assert_eq!(
            format_speaker_history("Critic", &turns),
            "### Critic - Step 1\n\none\n\n---\n\n### Critic - Step 2\n\ntwo"
        );
    }

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn long_contributions_are_cut() {
        let long = "x".repeat(300);
        let turns = vec![turn("ignored"), turn("short"), turn(&long)];
        let refs: Vec<&Turn> = turns.iter().collect();
        let summary = summarize_contribution(&refs);
        assert!(summary.starts_with("short x"));
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), 203);
    }

    #[test]
    fn unranked_scores_follow_ranked_ones() {
        let mut scores = BTreeMap::new();
        scores.insert("a".to_string(), 40);
        scores.insert("b".to_string(), 90);
        scores.insert("c".to_string(), 70);
        let evaluation = FinalEvaluation {
            scores,
            ranking: vec!["a".into()],
            reasoning: BTreeMap::new(),
            best_solution_summary: String::new(),
            evaluation_notes: String::new(),
        };
        let board = format_scoreboard(&evaluation, &[]);
        let a = board.find("| 1 | a | 40% |").unwrap();
        let b = board.find("| 2 | b | 90% |").unwrap();
        let c = board.find("| 3 | c | 70% |").unwrap();
        assert!(a < b && b < c);
    }
}
