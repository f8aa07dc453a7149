//! Mapping free-text classifier replies onto decisions.
//!
//! When the transition decision is delegated to a language model prompted
//! with [`render_transition_prompt`](crate::prompts::render_transition_prompt),
//! its answer comes back as prose. The model is asked to choose between
//! "Option 1: stay" and "Option 2: move", optionally naming the next task.

use super::{Decision, DecisionInput};
use crate::graph::constraint::mentions;
use regex::Regex;
use std::sync::OnceLock;

fn choice_pattern(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Interprets a classifier reply.
///
/// - a reply choosing to stay (`stay`, `option 1`) yields `Stay`, even if it
///   also talks about moving
/// - a reply naming a candidate by id or description advances to it
/// - a reply choosing to move (`move`, `option 2`) with a single candidate
///   advances to that candidate
/// - anything else yields `Stay`
pub fn interpret_reply(reply: &str, input: &DecisionInput<'_>) -> Decision {
    static STAY: OnceLock<Option<Regex>> = OnceLock::new();
    static MOVE: OnceLock<Option<Regex>> = OnceLock::new();

    let lower = reply.to_lowercase();
    let wants_stay = choice_pattern(&STAY, r"\b(stay|option\s*1)\b")
        .is_some_and(|re| re.is_match(&lower));
    if wants_stay {
        return Decision::Stay;
    }
    let wants_move = choice_pattern(&MOVE, r"\b(move|option\s*2)\b")
        .is_some_and(|re| re.is_match(&lower));

    let named = input.candidates.iter().find(|id| {
        mentions(reply, id.as_str())
            || input.graph.subtask(id).is_some_and(|s| {
                let description = s.description.trim().to_lowercase();
                !description.is_empty() && lower.contains(&description)
            })
    });
    if let Some(id) = named {
        return Decision::AdvanceTo(id.clone());
    }

    match input.candidates {
        [only] if wants_move => Decision::AdvanceTo(only.clone()),
        _ => Decision::Stay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{SubTask, SubTaskId, TaskGraph};
    use crate::history::DialogueHistory;

    fn graph() -> TaskGraph {
        TaskGraph::builder()
            .subtask(SubTask::new("N1", "Greeting and introduction"))
            .subtask(SubTask::new("N2", "Collect user information"))
            .subtask(SubTask::new("N3", "Offer a discount"))
            .parallel("N1", "N2")
            .parallel("N1", "N3")
            .build()
            .unwrap()
    }

    #[test]
    fn test_stay_replies() {
        let graph = graph();
        let history = DialogueHistory::new();
        let candidates = vec![SubTaskId::from("N2")];
        let input = DecisionInput {
            graph: &graph,
            history: &history,
            current: &SubTaskId::from("N1"),
            candidates: &candidates,
            revisitable: &[],
        };
        assert_eq!(interpret_reply("Option 1: stay on the current task", &input), Decision::Stay);
        assert_eq!(interpret_reply("Stay.", &input), Decision::Stay);
        assert_eq!(interpret_reply("I am not sure", &input), Decision::Stay);
    }

    #[test]
    fn test_move_with_single_candidate() {
        let graph = graph();
        let history = DialogueHistory::new();
        let candidates = vec![SubTaskId::from("N2")];
        let input = DecisionInput {
            graph: &graph,
            history: &history,
            current: &SubTaskId::from("N1"),
            candidates: &candidates,
            revisitable: &[],
        };
        assert_eq!(
            interpret_reply("Option 2: move to the next task", &input),
            Decision::AdvanceTo("N2".into())
        );
    }

    #[test]
    fn test_named_candidate() {
        let graph = graph();
        let history = DialogueHistory::new();
        let candidates = vec![SubTaskId::from("N2"), SubTaskId::from("N3")];
        let input = DecisionInput {
            graph: &graph,
            history: &history,
            current: &SubTaskId::from("N1"),
            candidates: &candidates,
            revisitable: &[],
        };
        assert_eq!(
            interpret_reply("Option 2, move to N3", &input),
            Decision::AdvanceTo("N3".into())
        );
        assert_eq!(
            interpret_reply("Move on: collect user information.", &input),
            Decision::AdvanceTo("N2".into())
        );
        // ambiguous move with several candidates
        assert_eq!(interpret_reply("move", &input), Decision::Stay);
    }

    #[test]
    fn test_stay_wins_over_move() {
        let graph = graph();
        let history = DialogueHistory::new();
        let candidates = vec![SubTaskId::from("N2")];
        let input = DecisionInput {
            graph: &graph,
            history: &history,
            current: &SubTaskId::from("N1"),
            candidates: &candidates,
            revisitable: &[],
        };
        assert_eq!(
            interpret_reply("Option 1. It is too early to move to N2.", &input),
            Decision::Stay
        );
    }

    #[test]
    fn test_empty_description_is_never_named() {
        let graph = TaskGraph::builder()
            .subtask(SubTask::new("N1", "Greeting"))
            .subtask(SubTask::new("N2", ""))
            .subtask(SubTask::new("N3", "Offer a discount"))
            .parallel("N1", "N2")
            .parallel("N1", "N3")
            .build()
            .unwrap();
        let history = DialogueHistory::new();
        let candidates = vec![SubTaskId::from("N2"), SubTaskId::from("N3")];
        let input = DecisionInput {
            graph: &graph,
            history: &history,
            current: &SubTaskId::from("N1"),
            candidates: &candidates,
            revisitable: &[],
        };
        assert_eq!(
            interpret_reply("Let's offer a discount", &input),
            Decision::AdvanceTo("N3".into())
        );
    }
}
