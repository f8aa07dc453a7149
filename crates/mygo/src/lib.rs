//! 'mygo' - Graph-guided orchestration for system-initiated, task-oriented dialogue.
//!
//! A predefined objective is decomposed into a graph of sub-tasks connected by
//! sequential, conditional and parallel dependencies and gated by constraints.
//! The crate keeps the dialogue on that graph turn by turn:
//!
//! - [`graph`]: the validated, immutable sub-task graph (JSON or Mermaid input)
//! - [`planner`]: per-session progress and transition validation
//! - [`decision`]: the stateless choice of the next transition
//! - [`session`]: the thin loop driving the chat agent and the user
//!
//! Utterance generation and the user are external collaborators behind the
//! [`ChatAgent`] and [`UserChannel`] traits.
//!
//! ```
//! use mygo::graph::{SubTask, TaskGraph};
//! use mygo::history::DialogueHistory;
//! use mygo::planner::StatePlanner;
//! use std::sync::Arc;
//!
//! let graph = TaskGraph::builder()
//!     .subtask(SubTask::new("greet", "Greeting and introduction"))
//!     .subtask(SubTask::new("collect", "Collect user information"))
//!     .sequential("greet", "collect")
//!     .build()
//!     .unwrap();
//!
//! let planner = StatePlanner::new(Arc::new(graph), Some(10));
//! let history = DialogueHistory::new();
//! assert_eq!(planner.candidates(&history)[0].as_str(), "collect");
//! ```

pub mod config;
pub mod decision;
pub mod graph;
pub mod history;
pub mod observability;
pub mod planner;
pub mod prompts;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use decision::{CompletionJudge, Decision, DecisionInput, DecisionMaker, FailReason};
pub use graph::{GraphError, GraphSpec, SubTask, SubTaskId, TaskGraph};
pub use history::{DialogueHistory, DialogueTurn, Speaker};
pub use planner::{PlannerError, ProgressState, StatePlanner};
pub use session::{
    AgentError, ChatAgent, Session, SessionError, SessionOutcome, SessionReport, UserChannel,
};
