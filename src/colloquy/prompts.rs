//! Prompt text for both flows.
//!
//! System prompts combine the participant's persona description with the directive of its
//! [`Attitude`]; per-turn instructions are appended as a trailing user message by the
//! [`TurnDriver`](crate::TurnDriver).

use crate::profile::{Attitude, ParticipantProfile};

/// Prefix `text` with `marker` unless it already starts with it.
///
/// ```rust
/// use colloquy::prompts::stamp_simulation;
///
/// assert_eq!(stamp_simulation("  hi ", "(AI SIMULATION)"), "(AI SIMULATION) hi");
/// assert_eq!(stamp_simulation("(AI SIMULATION) hi", "(AI SIMULATION)"), "(AI SIMULATION) hi");
/// ```
pub fn stamp_simulation(text: &str, marker: &str) -> String {
    let text = text.trim();
    if text.starts_with(marker) {
        text.to_string()
    } else {
        format!("{} {}", marker, text)
    }
}

/// Behavioural directive for each attitude.
pub fn attitude_directive(attitude: Attitude) -> &'static str {
    match attitude {
        Attitude::Adversarial => {
            "You are relentlessly adversarial. Contradict and take apart everything the other \
             side says, never concede a point, never look for common ground. Use sharp irony, \
             expose contradictions and back your attacks with data and statistics."
        }
        Attitude::Polite => {
            "You are courteous and respectful and you look for common ground, but you defend \
             your position with solid, well-reasoned arguments and do not let yourself be \
             pushed around."
        }
        Attitude::Chief => {
            "You orchestrate the panel. Ask specific, targeted questions, reference what the \
             experts said, keep them focused and steer toward a concrete, implementable \
             solution. Outside the final verdict keep every reply to 2-3 sentences."
        }
        Attitude::Strategist => {
            "Provide high-level abstractions, step-by-step algorithms and theoretical \
             frameworks. Be precise and methodical, use mathematical notation where it helps, \
             and keep every reply to 2-3 sentences."
        }
        Attitude::Critic => {
            "Be skeptical and rigorous. Find flaws, edge cases and failure modes, check the \
             arithmetic, question costs and feasibility, and attack anything vague. Stay \
             constructive and keep every reply to 2-3 sentences."
        }
    }
}

fn roster_lines(experts: &[&ParticipantProfile]) -> String {
    experts
        .iter()
        .enumerate()
        .map(|(idx, expert)| {
            format!(
                "{}. {} (Agent {}): {}",
                idx + 1,
                expert.display_name(),
                idx + 1,
                expert.persona_description()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt of the orchestrator in the problem-solving flow.
pub fn orchestrator_system_prompt(
    chief: &ParticipantProfile,
    experts: &[&ParticipantProfile],
    problem: &str,
    max_iterations: usize,
) -> String {
    format!(
        "You are {name}. {persona}\n\n\
         Your goal is to facilitate a solution for: '{problem}'.\n\n\
         Your experts:\n{roster}\n\n\
         ROLE:\n{directive}\n\n\
         The discussion runs for {max} iterations. Afterwards you will be asked for a final \
         verdict in strict JSON.\n\n\
         OUTPUT FORMAT: Markdown, bullet points, brief.",
        name = chief.display_name(),
        persona = chief.persona_description(),
        problem = problem,
        roster = roster_lines(experts),
        directive = attitude_directive(chief.attitude()),
        max = max_iterations,
    )
}

/// System prompt of an expert in the problem-solving flow.
pub fn expert_system_prompt(expert: &ParticipantProfile, problem: &str) -> String {
    format!(
        "You are {name}. {persona}\n\n\
         PROBLEM TO SOLVE: {problem}\n\n\
         ROLE:\n{directive}\n\n\
         OUTPUT FORMAT: Markdown, bullet points, brief.",
        name = expert.display_name(),
        persona = expert.persona_description(),
        problem = problem,
        directive = attitude_directive(expert.attitude()),
    )
}

fn reference_section(reference_solution: Option<&str>) -> String {
    match reference_solution {
        Some(reference) if !reference.trim().is_empty() => {
            format!("## Expected / Reference Solution\n{}\n\n", reference.trim())
        }
        _ => "## Expected / Reference Solution\n(Not provided)\n\n".to_string(),
    }
}

/// Orchestrator instruction for the first iteration.
pub fn opening_question(
    problem: &str,
    reference_solution: Option<&str>,
    experts: &[&ParticipantProfile],
) -> String {
    let names = experts
        .iter()
        .map(|e| e.display_name())
        .collect::<Vec<_>>()
        .join(" and ");
    format!(
        "## Problem Statement\n{}\n\n{}Analyze this problem and ask your first targeted question \
         to guide {} toward a solution. (Iteration 1)",
        problem,
        reference_section(reference_solution),
        names
    )
}

/// Orchestrator instruction for iterations after the first.
pub fn follow_up_directive(
    problem: &str,
    reference_solution: Option<&str>,
    latest_replies: &[(&str, &str)],
    iteration: usize,
    max_iterations: usize,
) -> String {
    let mut directive = format!(
        "## Problem Statement\n{}\n\n{}",
        problem,
        reference_section(reference_solution)
    );
    for (name, reply) in latest_replies {
        directive.push_str(&format!("{} said: {}\n\n", name, reply));
    }
    directive.push_str(&format!(
        "Analyze their responses and ask your next targeted question to refine the solution. \
         (Iteration {}/{})",
        iteration, max_iterations
    ));
    directive
}

/// Expert instruction: answer the orchestrator, and for critics also scrutinise whoever
/// already answered in this iteration.
pub fn expert_directive(
    expert: &ParticipantProfile,
    chief_name: &str,
    earlier_replies: &[(&str, &str)],
) -> String {
    match expert.attitude() {
        Attitude::Critic if !earlier_replies.is_empty() => {
            let names = earlier_replies
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(" and ");
            format!(
                "Respond to {}'s latest question AND analyze the proposal of {}. Find flaws, \
                 demand specifics, check feasibility.",
                chief_name, names
            )
        }
        Attitude::Strategist => format!(
            "Respond to {}'s latest question with your strategic analysis and approach.",
            chief_name
        ),
        _ => format!("Respond to {}'s latest question.", chief_name),
    }
}

/// JSON shape the orchestrator must return, one score and reasoning field per expert.
pub fn evaluation_schema(expert_count: usize) -> String {
    let mut fields = Vec::new();
    for n in 1..=expert_count {
        fields.push(format!("  \"score_agent_{}_percent\": <integer 0-100>", n));
    }
    let ranking = (1..=expert_count)
        .map(|n| format!("\"Agent {}\"", n))
        .collect::<Vec<_>>()
        .join(", ");
    fields.push(format!("  \"ranking\": [{}]", ranking));
    for n in 1..=expert_count {
        fields.push(format!(
            "  \"agent_{}_reasoning\": \"<concise judgement about Agent {}>\"",
            n, n
        ));
    }
    fields.push(
        "  \"best_solution_summary\": \"<short paragraph on the winning approach>\"".into(),
    );
    fields.push("  \"evaluation_notes\": \"<optional remarks or tie-breakers>\"".into());
    format!("{{\n{}\n}}", fields.join(",\n"))
}

/// Final scoring instruction for the orchestrator.
///
/// `contributions` lists every expert with its turns in order.
pub fn final_evaluation_brief(
    problem: &str,
    reference_solution: Option<&str>,
    contributions: &[(&ParticipantProfile, Vec<&str>)],
) -> String {
    let mut brief = format!(
        "## Problem Statement\n{}\n\n{}## COMPLETE SOLUTION HISTORY\n\n",
        problem,
        reference_section(reference_solution)
    );

    for (idx, (expert, turns)) in contributions.iter().enumerate() {
        brief.push_str(&format!(
            "### {} (Agent {}) - Contributions:\n",
            expert.display_name(),
            idx + 1
        ));
        if turns.is_empty() {
            brief.push_str("- No contributions recorded.\n\n");
        }
        for (step, text) in turns.iter().enumerate() {
            brief.push_str(&format!("- Step {}: {}\n\n", step + 1, text));
        }
    }

    brief.push_str("## FINAL EVALUATION - MANDATORY JSON RESPONSE\n\n");
    brief.push_str(
        "1. Compare each expert's complete history against the reference solution (if any).\n\
         2. Decide which expert provided the best solution.\n\
         3. Assign every expert an integer score from 0 to 100 for accuracy, completeness, \
         feasibility and alignment with the reference.\n\
         4. Summarize the best solution.\n\
         Do NOT ask follow-up questions; this is the final verdict.\n\n### Agent Mapping\n",
    );
    for (idx, (expert, _)) in contributions.iter().enumerate() {
        brief.push_str(&format!("- Agent {} = {}\n", idx + 1, expert.display_name()));
    }
    brief.push_str(&format!(
        "\nReturn ONLY this JSON object, no prose and no code fences:\n{}\n",
        evaluation_schema(contributions.len())
    ));
    brief
}

/// System prompt of a debater.
pub fn debate_system_prompt(profile: &ParticipantProfile, topic: &str, marker: &str) -> String {
    let name = profile.display_name();
    let mut prompt = format!(
        "You are an AI agent simulating an ALTER EGO inspired by {name}.\n\n\
         IDENTITY RULES:\n\
         - Never claim to actually be {name}; if you introduce yourself say \"I am an AI alter \
         ego inspired by {name}\".\n\
         - Every message MUST begin with \"{marker}\" followed by a space.\n\n\
         PERSONAL PROFILE:\n{persona}\n\n\
         ROLE IN THE DEBATE:\n{directive}\n\n\
         Bring concrete, specific material into the discussion: economic data, fiscal and \
         social policy, precise figures and official statistics.\n\n\
         The discussion topic is: {topic}\n\
         Always speak in English and stay faithful to your profile.\n\n\
         RESPONSE LENGTH: one sentence, at most two short sentences.",
        name = name,
        marker = marker,
        persona = profile.persona_description(),
        directive = attitude_directive(profile.attitude()),
        topic = topic,
    );

    if profile.attitude() == Attitude::Polite {
        prompt.push_str(&format!(
            "\n\nFIRST MESSAGE: if you open the conversation, begin with \"{} I am an AI alter ego \
             inspired by {}...\" and greet the other side introducing \"{}\" in one sentence.",
            marker, name, topic
        ));
    }
    prompt
}

/// Instruction for the very first debate turn, when there is no history yet.
pub fn debate_opening(topic: &str) -> String {
    format!("Open the debate on: {}", topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_scales_with_expert_count() {
        let schema = evaluation_schema(3);
        assert!(schema.contains("score_agent_3_percent"));
        assert!(schema.contains("[\"Agent 1\", \"Agent 2\", \"Agent 3\"]"));
        assert!(!schema.contains("score_agent_4_percent"));
    }

    #[test]
    fn missing_reference_is_marked_not_provided() {
        let text = follow_up_directive("P", Some("   "), &[("A", "x")], 2, 3);
        assert!(text.contains("(Not provided)"));
        assert!(text.contains("A said: x"));
        assert!(text.ends_with("(Iteration 2/3)"));
    }

    #[test]
    fn polite_debater_gets_opening_instructions() {
        let bob = ParticipantProfile::new("bob", "Bob", "p", Attitude::Polite, "m").unwrap();
        let alice =
            ParticipantProfile::new("alice", "Alice", "p", Attitude::Adversarial, "m").unwrap();
        assert!(debate_system_prompt(&bob, "T", "(AI SIMULATION)").contains("FIRST MESSAGE"));
        assert!(!debate_system_prompt(&alice, "T", "(AI SIMULATION)").contains("FIRST MESSAGE"));
    }
}
