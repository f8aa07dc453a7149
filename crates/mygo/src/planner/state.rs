//! Progress tracking for a single session.
//!
//! This module provides the per-sub-task state machine the planner drives.
//! Sub-tasks move through states as follows:
//! - `Pending` -> `Active` (when the planner transitions into it)
//! - `Active` -> `Completed` (advance or finish)
//! - `Active` -> `Skipped(Abandoned)` (the user gave up on it)
//! - `Active` -> `Pending` (another sub-task is revisited)
//! - `Skipped(Abandoned)` -> `Active` (revisit)
//! - `Pending` -> `Skipped(NotTaken)` (an alternative branch was chosen)
//!
//! `Completed` is final.

use crate::graph::{SubTaskId, TaskGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why a sub-task was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The user abandoned the sub-task; it may be revisited.
    Abandoned,
    /// A sibling alternative was taken instead.
    NotTaken,
}

/// Lifecycle state of one sub-task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    /// Not yet entered
    Pending,
    /// Currently pursued by the dialogue
    Active,
    /// Criteria were met
    Completed,
    /// Left without completion
    Skipped(SkipReason),
}

impl SubTaskStatus {
    /// Completed or abandoned; successors may proceed.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SubTaskStatus::Completed | SubTaskStatus::Skipped(SkipReason::Abandoned)
        )
    }
}

/// Status of one sub-task plus the turns at which it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskRecord {
    pub id: SubTaskId,
    pub status: SubTaskStatus,
    /// Turn at which the sub-task last became active
    pub activated_at: Option<usize>,
    /// Turn at which the sub-task was last closed
    pub closed_at: Option<usize>,
}

/// Snapshot of overall progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub skipped: usize,
    pub pending: usize,
    pub total: usize,
    /// Share of sub-tasks visited (completed or skipped), in `[0, 1]`.
    pub ratio: f64,
}

/// Status of every sub-task plus the active pointer.
///
/// At most one sub-task is active. Records are kept in graph declaration
/// order, so two equal states serialize to identical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    records: Vec<SubTaskRecord>,
    active: Option<SubTaskId>,
    #[serde(skip)]
    index: HashMap<SubTaskId, usize>,
}

impl ProgressState {
    /// All sub-tasks pending, the first root active from turn 1.
    pub fn initial(graph: &TaskGraph) -> Self {
        let records: Vec<SubTaskRecord> = graph
            .subtasks()
            .iter()
            .map(|s| SubTaskRecord {
                id: s.id.clone(),
                status: SubTaskStatus::Pending,
                activated_at: None,
                closed_at: None,
            })
            .collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let mut state = Self {
            records,
            active: None,
            index,
        };
        if let Some(root) = graph.roots().first() {
            state.activate(root, 1);
        }
        state
    }

    pub fn status(&self, id: &SubTaskId) -> Option<&SubTaskStatus> {
        self.record(id).map(|r| &r.status)
    }

    pub fn record(&self, id: &SubTaskId) -> Option<&SubTaskRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[SubTaskRecord] {
        &self.records
    }

    pub fn active(&self) -> Option<&SubTaskId> {
        self.active.as_ref()
    }

    /// Ids with the given status, in declaration order.
    pub fn with_status(&self, status: SubTaskStatus) -> Vec<SubTaskId> {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary {
            completed: 0,
            skipped: 0,
            pending: 0,
            total: self.records.len(),
            ratio: 0.0,
        };
        for record in &self.records {
            match record.status {
                SubTaskStatus::Completed => summary.completed += 1,
                SubTaskStatus::Skipped(_) => summary.skipped += 1,
                SubTaskStatus::Pending => summary.pending += 1,
                SubTaskStatus::Active => {}
            }
        }
        if summary.total > 0 {
            summary.ratio = (summary.completed + summary.skipped) as f64 / summary.total as f64;
        }
        summary
    }

    /// Serializes the state for snapshots and reports.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn record_mut(&mut self, id: &SubTaskId) -> Option<&mut SubTaskRecord> {
        self.index.get(id).map(|&i| &mut self.records[i])
    }

    pub(super) fn activate(&mut self, id: &SubTaskId, turn: usize) {
        if let Some(record) = self.record_mut(id) {
            record.status = SubTaskStatus::Active;
            record.activated_at = Some(turn);
            record.closed_at = None;
            self.active = Some(id.clone());
        }
    }

    /// Closes `id` with `status`, clearing the active pointer if it was active.
    pub(super) fn close(&mut self, id: &SubTaskId, status: SubTaskStatus, turn: usize) {
        if let Some(record) = self.record_mut(id) {
            record.status = status;
            record.closed_at = Some(turn);
        }
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }

    /// Returns an active sub-task to pending.
    pub(super) fn reopen(&mut self, id: &SubTaskId) {
        if let Some(record) = self.record_mut(id) {
            record.status = SubTaskStatus::Pending;
            record.activated_at = None;
            record.closed_at = None;
        }
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SubTask;

    fn graph() -> TaskGraph {
        TaskGraph::builder()
            .subtask(SubTask::new("a", "first"))
            .subtask(SubTask::new("b", "second"))
            .subtask(SubTask::new("c", "third"))
            .sequential("a", "b")
            .sequential("b", "c")
            .build()
            .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let state = ProgressState::initial(&graph());
        assert_eq!(state.active(), Some(&SubTaskId::from("a")));
        assert_eq!(state.status(&"a".into()), Some(&SubTaskStatus::Active));
        assert_eq!(state.status(&"b".into()), Some(&SubTaskStatus::Pending));
        assert_eq!(state.status(&"zz".into()), None);
        assert_eq!(state.record(&"a".into()).unwrap().activated_at, Some(1));
    }

    #[test]
    fn test_close_and_activate() {
        let mut state = ProgressState::initial(&graph());
        state.close(&"a".into(), SubTaskStatus::Completed, 2);
        assert_eq!(state.active(), None);
        state.activate(&"b".into(), 2);

        assert_eq!(state.active(), Some(&SubTaskId::from("b")));
        assert_eq!(state.record(&"a".into()).unwrap().closed_at, Some(2));
        assert_eq!(state.with_status(SubTaskStatus::Completed), vec![SubTaskId::from("a")]);
    }

    #[test]
    fn test_summary() {
        let mut state = ProgressState::initial(&graph());
        state.close(&"a".into(), SubTaskStatus::Completed, 2);
        state.activate(&"b".into(), 2);
        state.close(&"b".into(), SubTaskStatus::Skipped(SkipReason::Abandoned), 3);

        let summary = state.summary();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.total, 3);
        assert!((summary.ratio - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_settled() {
        assert!(SubTaskStatus::Completed.is_settled());
        assert!(SubTaskStatus::Skipped(SkipReason::Abandoned).is_settled());
        assert!(!SubTaskStatus::Skipped(SkipReason::NotTaken).is_settled());
        assert!(!SubTaskStatus::Active.is_settled());
    }

    #[test]
    fn test_serialization_is_stable() {
        let state = ProgressState::initial(&graph());
        let json = state.to_json().unwrap();
        assert_eq!(json, state.clone().to_json().unwrap());
        assert!(json.contains("\"status\":\"active\""));
        assert!(!json.contains("index"));
    }
}
