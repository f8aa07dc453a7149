//! Error types for the orchestration loop and its collaborators.

use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::prompts::PromptError;
use thiserror::Error;

/// Errors raised by the chat agent or the user channel.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The collaborator failed to produce an utterance.
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Agent error: {0}")]
    Other(String),
}

/// Errors that end a session without an outcome.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The task graph failed validation; the session never started.
    #[error("Invalid task graph: {0}")]
    InvalidGraph(#[from] GraphError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A collaborator failed mid-session. Committed progress is kept.
    #[error("Collaborator failed: {0}")]
    Agent(#[from] AgentError),

    /// `run` was called on a session that already reached an outcome.
    #[error("Session already finished")]
    AlreadyFinished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_maps_to_invalid_graph() {
        let err: SessionError = GraphError::invalid("graph has no sub-tasks").into();
        assert!(matches!(err, SessionError::InvalidGraph(_)));
        assert_eq!(
            err.to_string(),
            "Invalid task graph: Invalid graph: graph has no sub-tasks"
        );
    }

    #[test]
    fn test_agent_error_display() {
        let err: SessionError = AgentError::ExecutionFailed("timeout".into()).into();
        assert_eq!(err.to_string(), "Collaborator failed: Agent execution failed: timeout");
    }
}
