//! Per-session record of which sub-task each turn was spent on.
//!
//! External evaluation tooling reads the trace to compute path metrics; the
//! orchestration core only records it.

use crate::decision::Decision;
use crate::graph::SubTaskId;
use crate::planner::Transition;
use serde::{Deserialize, Serialize};

/// How a visit to a sub-task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentOutcome {
    Completed,
    /// Abandoned by the user
    Skipped,
    /// Left to revisit an earlier sub-task
    Reverted,
    /// Still active when the session ended
    Unfinished,
}

/// A contiguous run of turns spent on one sub-task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSegment {
    pub subtask: SubTaskId,
    pub first_turn: usize,
    pub last_turn: usize,
    pub outcome: SegmentOutcome,
}

/// A decision the planner refused; the turn continued as a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedDecision {
    pub turn: usize,
    pub decision: Decision,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTrace {
    pub segments: Vec<TraceSegment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedDecision>,
}

impl SessionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sub-task ids in the order they were visited.
    pub fn path(&self) -> Vec<&SubTaskId> {
        self.segments.iter().map(|s| &s.subtask).collect()
    }

    /// Records that `turn` was spent on `subtask`.
    pub(crate) fn touch(&mut self, subtask: &SubTaskId, turn: usize) {
        match self.segments.last_mut() {
            Some(last) if last.outcome == SegmentOutcome::Unfinished && &last.subtask == subtask => {
                last.last_turn = turn;
            }
            _ => self.segments.push(TraceSegment {
                subtask: subtask.clone(),
                first_turn: turn,
                last_turn: turn,
                outcome: SegmentOutcome::Unfinished,
            }),
        }
    }

    /// Closes the open segment according to a committed transition.
    pub(crate) fn apply(&mut self, transition: &Transition) {
        let outcome = match transition {
            Transition::Advanced { .. } | Transition::Finished { .. } => SegmentOutcome::Completed,
            Transition::Skipped { .. } => SegmentOutcome::Skipped,
            Transition::Revisited { .. } => SegmentOutcome::Reverted,
            Transition::Stayed | Transition::Failed { .. } => return,
        };
        if let Some(last) = self
            .segments
            .last_mut()
            .filter(|s| s.outcome == SegmentOutcome::Unfinished)
        {
            last.outcome = outcome;
        }
    }

    pub(crate) fn reject(&mut self, turn: usize, decision: &Decision, reason: impl ToString) {
        self.rejected.push(RejectedDecision {
            turn,
            decision: decision.clone(),
            reason: reason.to_string(),
        });
    }
}
