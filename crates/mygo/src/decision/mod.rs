//! Decision Maker: picks the next transition each turn.
//!
//! The decision maker is stateless. It sees the dialogue slice since the
//! current sub-task became active, the candidates offered by the planner and
//! the graph, and returns one [`Decision`]. It never mutates anything; the
//! planner validates and applies the decision.

pub mod judge;
pub mod reply;

pub use judge::{CompletionJudge, FnJudge, KeywordJudge, Verdict, default_abandon_phrases};
pub use reply::interpret_reply;

use crate::graph::{EdgeKind, SubTask, SubTaskId, TaskGraph};
use crate::history::DialogueHistory;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Why the dialogue cannot continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// The current sub-task is done but nothing can follow it.
    DeadEnd,
    /// The user gave up and there is nowhere to go.
    Abandoned,
}

/// A transition chosen for the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "target", rename_all = "snake_case")]
pub enum Decision {
    /// Keep working on the current sub-task.
    Stay,
    /// Current sub-task completed; move to the target.
    AdvanceTo(SubTaskId),
    /// Current sub-task abandoned; move to the target.
    SkipTo(SubTaskId),
    /// Current sub-task completed and the dialogue can end.
    Finish,
    /// Return to a previously abandoned sub-task.
    Revisit(SubTaskId),
    Fail(FailReason),
}

impl Decision {
    /// The sub-task the decision moves into, if any.
    pub fn target(&self) -> Option<&SubTaskId> {
        match self {
            Decision::AdvanceTo(id) | Decision::SkipTo(id) | Decision::Revisit(id) => Some(id),
            Decision::Stay | Decision::Finish | Decision::Fail(_) => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Stay => write!(f, "stay"),
            Decision::AdvanceTo(id) => write!(f, "advance_to({id})"),
            Decision::SkipTo(id) => write!(f, "skip_to({id})"),
            Decision::Finish => write!(f, "finish"),
            Decision::Revisit(id) => write!(f, "revisit({id})"),
            Decision::Fail(FailReason::DeadEnd) => write!(f, "fail(dead_end)"),
            Decision::Fail(FailReason::Abandoned) => write!(f, "fail(abandoned)"),
        }
    }
}

/// Everything the decision maker looks at for one turn.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub graph: &'a TaskGraph,
    pub history: &'a DialogueHistory,
    pub current: &'a SubTaskId,
    /// Planner candidates, in declaration order.
    pub candidates: &'a [SubTaskId],
    /// Abandoned sub-tasks that may be revisited.
    pub revisitable: &'a [SubTaskId],
}

/// Chooses the next transition from a completion verdict and the candidates.
pub struct DecisionMaker {
    judge: Box<dyn CompletionJudge>,
    history_window: Option<usize>,
}

impl Default for DecisionMaker {
    fn default() -> Self {
        Self::new(KeywordJudge::default())
    }
}

impl fmt::Debug for DecisionMaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionMaker")
            .field("history_window", &self.history_window)
            .finish_non_exhaustive()
    }
}

impl DecisionMaker {
    pub fn new(judge: impl CompletionJudge + 'static) -> Self {
        Self {
            judge: Box::new(judge),
            history_window: None,
        }
    }

    /// Limits how many trailing utterances the judge sees.
    pub fn with_history_window(mut self, window: Option<usize>) -> Self {
        self.history_window = window;
        self
    }

    /// Decides the transition for this turn.
    ///
    /// Deterministic for a given input.
    pub fn decide(&self, input: &DecisionInput<'_>) -> Decision {
        let Some(subtask) = input.graph.subtask(input.current) else {
            return Decision::Stay;
        };

        let since = input.history.since_subtask(input.current);
        let slice = match self.history_window {
            Some(n) => &since[since.len().saturating_sub(n)..],
            None => since,
        };
        let revisitable: Vec<&SubTask> = input
            .revisitable
            .iter()
            .filter_map(|id| input.graph.subtask(id))
            .collect();

        let verdict = self.judge.verdict(slice, subtask, &revisitable);
        debug!(
            target = "mygo::decision",
            subtask = %input.current,
            verdict = ?verdict,
            candidates = input.candidates.len(),
            event = "verdict"
        );

        match verdict {
            Verdict::Unsatisfied => Decision::Stay,
            Verdict::Revisit(id) if input.revisitable.contains(&id) => Decision::Revisit(id),
            Verdict::Revisit(_) => Decision::Stay,
            Verdict::Abandoned => match best_candidate(input) {
                Some(next) => Decision::SkipTo(next),
                None => Decision::Fail(FailReason::Abandoned),
            },
            Verdict::Satisfied => match best_candidate(input) {
                Some(next) => Decision::AdvanceTo(next),
                None if input.graph.is_terminal(input.current) => Decision::Finish,
                None if awaiting_branch(input) => Decision::Stay,
                None => Decision::Fail(FailReason::DeadEnd),
            },
        }
    }
}

/// True while the current sub-task has a conditional branch the user has
/// not picked yet.
fn awaiting_branch(input: &DecisionInput<'_>) -> bool {
    input.graph.outgoing(input.current).any(|e| {
        e.kind == EdgeKind::Conditional && !input.graph.condition_met(e, input.history)
    })
}

/// Orders candidates by declared priority (lower first, undeclared last),
/// then by branch evidence from the current sub-task, then declaration order.
fn best_candidate(input: &DecisionInput<'_>) -> Option<SubTaskId> {
    input
        .candidates
        .iter()
        .min_by_key(|id| {
            let priority = input.graph.subtask(id).and_then(|s| s.priority);
            let evidence = input
                .graph
                .edge(input.current, id)
                .is_some_and(|e| {
                    e.kind == EdgeKind::Conditional && input.graph.condition_met(e, input.history)
                });
            (
                priority.is_none(),
                priority,
                !evidence,
                input.graph.position(id),
            )
        })
        .cloned()
}
