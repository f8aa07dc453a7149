//! Error types for task graph construction and validation.

use super::SubTaskId;
use thiserror::Error;

/// Errors raised while building or validating a [`TaskGraph`](super::TaskGraph).
///
/// All of these are fatal at session construction: a graph that fails
/// validation is never handed to the planner.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The dependency edges contain a cycle through the given sub-task.
    #[error("Cycle detected through sub-task: {0}")]
    CycleDetected(SubTaskId),

    /// The sub-task cannot be reached from any root.
    #[error("Sub-task is unreachable from every root: {0}")]
    UnreachableSubTask(SubTaskId),

    /// The graph document is structurally broken (unknown ids, duplicates, ...).
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// The graph document could not be parsed as JSON.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl GraphError {
    /// Shorthand for [`GraphError::InvalidGraph`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidGraph(reason.into())
    }
}
