//! State Planner: owns progress and validates every transition.
//!
//! The planner is the single writer of [`ProgressState`]. It computes the
//! candidate set for the Decision Maker, applies decisions atomically and
//! reports when the session should end. A rejected decision leaves the state
//! exactly as it was.

pub mod state;

pub use state::{ProgressState, ProgressSummary, SkipReason, SubTaskRecord, SubTaskStatus};

use crate::decision::{Decision, FailReason};
use crate::graph::{EvalContext, SubTaskId, TaskGraph};
use crate::history::DialogueHistory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("Illegal transition from {from:?} to {to}: {reason}")]
    IllegalTransition {
        from: Option<SubTaskId>,
        to: String,
        reason: String,
    },

    #[error("No sub-task is active")]
    NoActiveSubTask,

    #[error("Unknown sub-task: {0}")]
    UnknownSubTask(SubTaskId),
}

impl PlannerError {
    fn illegal(from: &SubTaskId, to: impl ToString, reason: impl Into<String>) -> Self {
        Self::IllegalTransition {
            from: Some(from.clone()),
            to: to.to_string(),
            reason: reason.into(),
        }
    }
}

/// A transition the planner applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Stayed,
    Advanced {
        from: SubTaskId,
        to: SubTaskId,
        /// Alternatives closed as not taken.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        closed: Vec<SubTaskId>,
    },
    Skipped {
        from: SubTaskId,
        to: SubTaskId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        closed: Vec<SubTaskId>,
    },
    Finished {
        from: SubTaskId,
    },
    Revisited {
        from: SubTaskId,
        to: SubTaskId,
    },
    Failed {
        reason: FailReason,
    },
}

/// Why a session is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Nothing is active and nothing more can start.
    Success,
    /// The turn budget is spent.
    BudgetExhausted,
    /// Nothing is active but unlocked work is blocked by constraints.
    Stalled,
}

/// Drives one session's progress through the task graph.
#[derive(Debug, Clone)]
pub struct StatePlanner {
    graph: Arc<TaskGraph>,
    state: ProgressState,
    max_turns: Option<usize>,
    turns_taken: usize,
}

impl StatePlanner {
    /// Starts with every sub-task pending and the first root active.
    pub fn new(graph: Arc<TaskGraph>, max_turns: Option<usize>) -> Self {
        let state = ProgressState::initial(&graph);
        Self {
            graph,
            state,
            max_turns,
            turns_taken: 0,
        }
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// The active sub-task, if any.
    pub fn current(&self) -> Option<&SubTaskId> {
        self.state.active()
    }

    pub fn turns_taken(&self) -> usize {
        self.turns_taken
    }

    pub fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }

    /// Turns left in the budget, `None` when unbounded.
    pub fn remaining_turns(&self) -> Option<usize> {
        self.max_turns.map(|max| max.saturating_sub(self.turns_taken))
    }

    pub fn budget_exhausted(&self) -> bool {
        self.max_turns.is_some_and(|max| self.turns_taken >= max)
    }

    /// Evaluation context for the turn about to be taken.
    pub fn context<'a>(&self, history: &'a DialogueHistory) -> EvalContext<'a> {
        EvalContext::new(history, self.turns_taken + 1).with_remaining_turns(self.remaining_turns())
    }

    /// Sub-tasks the dialogue may move into from the current one.
    ///
    /// The union of the current sub-task's reachable successors and every
    /// other pending sub-task unlocked once the current one completes, in
    /// declaration order. Empty when nothing is active. Calling this twice
    /// without an intervening commit returns the same list.
    pub fn candidates(&self, history: &DialogueHistory) -> Vec<SubTaskId> {
        let Some(current) = self.state.active() else {
            return Vec::new();
        };
        let ctx = self.context(history);

        let mut candidates = self.graph.reachable_from(&self.state, current, &ctx);
        for id in self
            .graph
            .unlocked(&self.state, &ctx.assuming_completed(current))
        {
            if &id != current && !candidates.contains(&id) {
                candidates.push(id);
            }
        }
        candidates.sort_by_key(|id| self.graph.position(id));
        candidates
    }

    /// Abandoned sub-tasks the dialogue may return to.
    pub fn revisitable(&self) -> Vec<SubTaskId> {
        self.state
            .with_status(SubTaskStatus::Skipped(SkipReason::Abandoned))
    }

    /// Validates and applies `decision`.
    ///
    /// Every precondition is checked before the first write; on error the
    /// state is untouched.
    pub fn commit(
        &mut self,
        decision: &Decision,
        history: &DialogueHistory,
    ) -> Result<Transition, PlannerError> {
        let turn = self.turns_taken + 1;

        let transition = match decision {
            Decision::Stay => Transition::Stayed,
            Decision::Fail(reason) => Transition::Failed { reason: *reason },
            Decision::AdvanceTo(target) | Decision::SkipTo(target) => {
                let from = self.active_or_err()?;
                self.known_or_err(target)?;
                if !self.candidates(history).contains(target) {
                    return Err(PlannerError::illegal(&from, target, "not a candidate"));
                }
                let closed = self.alternatives_closed_by(&from, target);

                let status = if matches!(decision, Decision::SkipTo(_)) {
                    SubTaskStatus::Skipped(SkipReason::Abandoned)
                } else {
                    SubTaskStatus::Completed
                };
                self.state.close(&from, status, turn);
                for id in &closed {
                    self.state
                        .close(id, SubTaskStatus::Skipped(SkipReason::NotTaken), turn);
                }
                self.state.activate(target, turn + 1);

                let to = target.clone();
                if matches!(decision, Decision::SkipTo(_)) {
                    Transition::Skipped { from, to, closed }
                } else {
                    Transition::Advanced { from, to, closed }
                }
            }
            Decision::Finish => {
                let from = self.active_or_err()?;
                if !self.candidates(history).is_empty() {
                    return Err(PlannerError::illegal(&from, "finish", "candidates remain"));
                }
                self.state.close(&from, SubTaskStatus::Completed, turn);
                Transition::Finished { from }
            }
            Decision::Revisit(target) => {
                let from = self.active_or_err()?;
                self.known_or_err(target)?;
                if !self.revisitable().contains(target) {
                    return Err(PlannerError::illegal(&from, target, "not revisitable"));
                }
                self.state.reopen(&from);
                self.state.activate(target, turn + 1);
                Transition::Revisited {
                    from,
                    to: target.clone(),
                }
            }
        };

        if transition != Transition::Stayed {
            info!(
                target = "mygo::planner",
                turn,
                decision = %decision,
                active = ?self.state.active(),
                event = "transition_committed"
            );
        }
        Ok(transition)
    }

    /// Counts one completed turn against the budget.
    pub fn record_turn(&mut self) {
        self.turns_taken += 1;
        debug!(
            target = "mygo::planner",
            turns_taken = self.turns_taken,
            remaining = ?self.remaining_turns(),
            event = "turn_recorded"
        );
    }

    /// Whether, and why, the session is over.
    pub fn termination(&self, history: &DialogueHistory) -> Option<Termination> {
        if self.state.active().is_none() {
            let blocked = self
                .graph
                .subtasks()
                .iter()
                .any(|s| self.graph.is_unlocked_structurally(&self.state, &s.id, history));
            return Some(if blocked {
                Termination::Stalled
            } else {
                Termination::Success
            });
        }
        if self.budget_exhausted() {
            return Some(Termination::BudgetExhausted);
        }
        None
    }

    pub fn is_terminal(&self, history: &DialogueHistory) -> bool {
        self.termination(history).is_some()
    }

    pub fn progress(&self) -> ProgressSummary {
        self.state.summary()
    }

    fn active_or_err(&self) -> Result<SubTaskId, PlannerError> {
        self.state
            .active()
            .cloned()
            .ok_or(PlannerError::NoActiveSubTask)
    }

    fn known_or_err(&self, id: &SubTaskId) -> Result<(), PlannerError> {
        if self.graph.contains(id) {
            Ok(())
        } else {
            Err(PlannerError::UnknownSubTask(id.clone()))
        }
    }

    /// Pending sequential/conditional siblings of `target` under `from`.
    fn alternatives_closed_by(&self, from: &SubTaskId, target: &SubTaskId) -> Vec<SubTaskId> {
        let taken_as_alternative = self
            .graph
            .edge(from, target)
            .is_some_and(|e| e.is_alternative());
        if !taken_as_alternative {
            return Vec::new();
        }
        self.graph
            .outgoing(from)
            .filter(|e| e.is_alternative() && &e.target != target)
            .filter(|e| matches!(self.state.status(&e.target), Some(SubTaskStatus::Pending)))
            .map(|e| e.target.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Constraint, ConstraintRule, SubTask};

    fn id(s: &str) -> SubTaskId {
        SubTaskId::from(s)
    }

    fn linear() -> Arc<TaskGraph> {
        Arc::new(
            TaskGraph::builder()
                .subtask(SubTask::new("a", "first"))
                .subtask(SubTask::new("b", "second"))
                .subtask(SubTask::new("c", "third"))
                .sequential("a", "b")
                .sequential("b", "c")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_new_activates_first_root() {
        let planner = StatePlanner::new(linear(), Some(5));
        assert_eq!(planner.current(), Some(&id("a")));
        assert_eq!(planner.remaining_turns(), Some(5));
        assert!(!planner.budget_exhausted());
    }

    #[test]
    fn test_advance_and_finish() {
        let mut planner = StatePlanner::new(linear(), None);
        let history = DialogueHistory::new();

        assert_eq!(planner.candidates(&history), vec![id("b")]);
        planner.commit(&Decision::AdvanceTo(id("b")), &history).unwrap();
        planner.commit(&Decision::AdvanceTo(id("c")), &history).unwrap();
        assert!(planner.candidates(&history).is_empty());

        let transition = planner.commit(&Decision::Finish, &history).unwrap();
        assert_eq!(transition, Transition::Finished { from: id("c") });
        assert_eq!(planner.current(), None);
        assert_eq!(planner.termination(&history), Some(Termination::Success));
        assert_eq!(planner.progress().completed, 3);
    }

    #[test]
    fn test_illegal_advance_leaves_state() {
        let mut planner = StatePlanner::new(linear(), None);
        let history = DialogueHistory::new();
        let before = planner.state().clone();

        let err = planner
            .commit(&Decision::AdvanceTo(id("c")), &history)
            .unwrap_err();
        assert!(matches!(err, PlannerError::IllegalTransition { .. }));
        assert_eq!(planner.state(), &before);

        let err = planner.commit(&Decision::Finish, &history).unwrap_err();
        assert!(matches!(err, PlannerError::IllegalTransition { .. }));
        assert_eq!(planner.state(), &before);

        let err = planner
            .commit(&Decision::AdvanceTo(id("ghost")), &history)
            .unwrap_err();
        assert_eq!(err, PlannerError::UnknownSubTask(id("ghost")));
    }

    #[test]
    fn test_stay_and_fail_change_nothing() {
        let mut planner = StatePlanner::new(linear(), None);
        let history = DialogueHistory::new();
        let before = planner.state().clone();

        assert_eq!(planner.commit(&Decision::Stay, &history).unwrap(), Transition::Stayed);
        assert_eq!(
            planner
                .commit(&Decision::Fail(FailReason::DeadEnd), &history)
                .unwrap(),
            Transition::Failed {
                reason: FailReason::DeadEnd
            }
        );
        assert_eq!(planner.state(), &before);
    }

    #[test]
    fn test_alternatives_closed_as_not_taken() {
        let graph = Arc::new(
            TaskGraph::builder()
                .subtask(SubTask::new("ask", "Ask preference"))
                .subtask(SubTask::new("email", "Collect email"))
                .subtask(SubTask::new("phone", "Collect phone"))
                .sequential("ask", "email")
                .sequential("ask", "phone")
                .build()
                .unwrap(),
        );
        let mut planner = StatePlanner::new(graph, None);
        let history = DialogueHistory::new();

        assert_eq!(planner.candidates(&history), vec![id("email"), id("phone")]);
        let transition = planner
            .commit(&Decision::AdvanceTo(id("phone")), &history)
            .unwrap();
        assert_eq!(
            transition,
            Transition::Advanced {
                from: id("ask"),
                to: id("phone"),
                closed: vec![id("email")],
            }
        );
        assert_eq!(
            planner.state().status(&id("email")),
            Some(&SubTaskStatus::Skipped(SkipReason::NotTaken))
        );

        planner.commit(&Decision::Finish, &history).unwrap();
        assert_eq!(planner.termination(&history), Some(Termination::Success));
    }

    #[test]
    fn test_skip_then_revisit() {
        let mut planner = StatePlanner::new(linear(), None);
        let history = DialogueHistory::new();

        planner.commit(&Decision::SkipTo(id("b")), &history).unwrap();
        assert_eq!(planner.revisitable(), vec![id("a")]);

        let transition = planner.commit(&Decision::Revisit(id("a")), &history).unwrap();
        assert_eq!(
            transition,
            Transition::Revisited {
                from: id("b"),
                to: id("a")
            }
        );
        assert_eq!(planner.current(), Some(&id("a")));
        assert_eq!(planner.state().status(&id("b")), Some(&SubTaskStatus::Pending));

        // completing the revisited sub-task makes its successor a candidate again
        assert_eq!(planner.candidates(&history), vec![id("b")]);
    }

    #[test]
    fn test_revisit_requires_abandoned() {
        let mut planner = StatePlanner::new(linear(), None);
        let history = DialogueHistory::new();
        planner.commit(&Decision::AdvanceTo(id("b")), &history).unwrap();

        let err = planner.commit(&Decision::Revisit(id("a")), &history).unwrap_err();
        assert!(matches!(err, PlannerError::IllegalTransition { .. }));
        assert_eq!(planner.state().status(&id("a")), Some(&SubTaskStatus::Completed));
    }

    #[test]
    fn test_budget() {
        let mut planner = StatePlanner::new(linear(), Some(2));
        let history = DialogueHistory::new();
        planner.record_turn();
        assert_eq!(planner.termination(&history), None);
        planner.record_turn();
        assert!(planner.budget_exhausted());
        assert_eq!(planner.termination(&history), Some(Termination::BudgetExhausted));
        assert!(planner.is_terminal(&history));
    }

    #[test]
    fn test_resource_constraint_uses_budget() {
        let graph = Arc::new(
            TaskGraph::builder()
                .subtask(SubTask::new("a", "first"))
                .subtask(SubTask::new("b", "long form"))
                .sequential("a", "b")
                .constraint(Constraint::on_subtask(
                    "b",
                    ConstraintRule::RemainingTurns { at_least: 3 },
                ))
                .build()
                .unwrap(),
        );
        let history = DialogueHistory::new();

        let planner = StatePlanner::new(graph.clone(), Some(10));
        assert_eq!(planner.candidates(&history), vec![id("b")]);

        let mut planner = StatePlanner::new(graph, Some(3));
        planner.record_turn();
        assert!(planner.candidates(&history).is_empty());
    }

    #[test]
    fn test_stalled_when_constraints_block_remaining_work() {
        let graph = Arc::new(
            TaskGraph::builder()
                .subtask(SubTask::new("a", "first"))
                .subtask(SubTask::new("b", "later"))
                .constraint(Constraint::on_subtask(
                    "b",
                    ConstraintRule::TurnWindow {
                        min: Some(10),
                        max: None,
                    },
                ))
                .build()
                .unwrap(),
        );
        let mut planner = StatePlanner::new(graph, None);
        let history = DialogueHistory::new();

        assert!(planner.candidates(&history).is_empty());
        planner.commit(&Decision::Finish, &history).unwrap();
        assert_eq!(planner.termination(&history), Some(Termination::Stalled));
    }
}
