//! Orchestration loop.
//!
//! A [`Session`] glues the planner and the decision maker to the external
//! collaborators. Each turn runs:
//!
//! 1. ask the planner for the current sub-task and its candidates
//! 2. let the [`ChatAgent`] speak
//! 3. wait for the [`UserChannel`]
//! 4. recompute the candidates against the reply and ask the decision maker
//!    for a transition
//! 5. commit it (a rejected decision becomes a stay)
//! 6. count the turn and check whether the session is over
//!
//! The session owns its state exclusively. Only the task graph is shared,
//! read-only, between sessions.

pub mod error;
pub mod trace;

pub use error::{AgentError, SessionError};
pub use trace::{RejectedDecision, SegmentOutcome, SessionTrace, TraceSegment};

use crate::config::SessionConfig;
use crate::decision::{Decision, DecisionInput, DecisionMaker, FailReason, KeywordJudge};
use crate::graph::{GraphSpec, SubTask, TaskGraph};
use crate::history::DialogueHistory;
use crate::planner::{ProgressState, ProgressSummary, StatePlanner, Termination, Transition};
use crate::prompts::ChatRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Produces the system's utterances.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Generates the next utterance for the current sub-task.
    async fn respond(&self, request: ChatRequest<'_>) -> Result<String, AgentError>;

    /// Closing message after a successful session. `None` skips it.
    async fn farewell(&self, history: &DialogueHistory) -> Result<Option<String>, AgentError> {
        let _ = history;
        Ok(None)
    }
}

/// Supplies the user's replies.
#[async_trait]
pub trait UserChannel: Send {
    /// The next user utterance, or `None` once the user has left.
    async fn next_utterance(
        &mut self,
        history: &DialogueHistory,
    ) -> Result<Option<String>, AgentError>;
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The dialogue reached a terminal sub-task with nothing left to do.
    Success,
    /// The user left, gave up with nowhere to go, or the session was cancelled.
    Abandoned,
    /// The turn budget ran out.
    BudgetExhausted,
    /// Progress became impossible.
    DeadEnd,
}

impl From<Termination> for SessionOutcome {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Success => SessionOutcome::Success,
            Termination::BudgetExhausted => SessionOutcome::BudgetExhausted,
            Termination::Stalled => SessionOutcome::DeadEnd,
        }
    }
}

impl From<FailReason> for SessionOutcome {
    fn from(reason: FailReason) -> Self {
        match reason {
            FailReason::DeadEnd => SessionOutcome::DeadEnd,
            FailReason::Abandoned => SessionOutcome::Abandoned,
        }
    }
}

/// Everything external evaluation needs about a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Turns taken
    pub turns: usize,
    pub trace: SessionTrace,
    pub progress: ProgressSummary,
    pub history: DialogueHistory,
    pub final_state: ProgressState,
}

impl SessionReport {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A single dialogue over a task graph.
///
/// # Examples
///
/// ```
/// use mygo::config::SessionConfig;
/// use mygo::graph::TaskGraph;
/// use mygo::session::Session;
/// use std::sync::Arc;
///
/// let graph = Arc::new(TaskGraph::from_mermaid("A[Greet] --> B[Collect details]").unwrap());
/// let session = Session::with_graph(graph, SessionConfig::default()).unwrap();
/// assert_eq!(session.planner().current().unwrap().as_str(), "A");
/// ```
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    planner: StatePlanner,
    decision_maker: DecisionMaker,
    history: DialogueHistory,
    trace: SessionTrace,
    outcome: Option<SessionOutcome>,
}

impl Session {
    /// Validates `spec` and prepares a session over it.
    pub fn new(spec: GraphSpec, config: SessionConfig) -> Result<Self, SessionError> {
        let graph = TaskGraph::from_spec(spec)?;
        Self::with_graph(Arc::new(graph), config)
    }

    /// Prepares a session over an already validated, possibly shared graph.
    pub fn with_graph(graph: Arc<TaskGraph>, config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let judge = KeywordJudge::new().with_abandon_phrases(config.abandon_phrases.clone());
        let decision_maker =
            DecisionMaker::new(judge).with_history_window(config.history_window);
        Ok(Self {
            planner: StatePlanner::new(graph, config.max_turns),
            decision_maker,
            history: DialogueHistory::new(),
            trace: SessionTrace::new(),
            outcome: None,
            config,
        })
    }

    /// Replaces the default rule-based decision maker.
    pub fn with_decision_maker(mut self, decision_maker: DecisionMaker) -> Self {
        self.decision_maker = decision_maker.with_history_window(self.config.history_window);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn planner(&self) -> &StatePlanner {
        &self.planner
    }

    pub fn history(&self) -> &DialogueHistory {
        &self.history
    }

    pub fn trace(&self) -> &SessionTrace {
        &self.trace
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    /// Runs the dialogue to an outcome.
    ///
    /// Cancelling `cancel` ends the session as `Abandoned` with the last
    /// committed state. A collaborator error aborts with
    /// [`SessionError::Agent`]; the committed state stays inspectable.
    pub async fn run(
        &mut self,
        chat: &dyn ChatAgent,
        user: &mut dyn UserChannel,
        cancel: &CancellationToken,
    ) -> Result<SessionReport, SessionError> {
        if self.outcome.is_some() {
            return Err(SessionError::AlreadyFinished);
        }

        let span = info_span!(
            "session",
            task = %self.config.task,
            subtasks = self.planner.graph().len(),
            max_turns = ?self.config.max_turns
        );
        async move {
            info!(target = "mygo::session", event = "session_started");

            let outcome = self.drive(chat, user, cancel).await?;
            if outcome == SessionOutcome::Success && self.config.farewell {
                self.say_farewell(chat, cancel).await?;
            }
            self.outcome = Some(outcome);

            let report = self.report(outcome);
            info!(
                target = "mygo::session",
                outcome = ?outcome,
                turns = report.turns,
                completed = report.progress.completed,
                total = report.progress.total,
                event = "session_finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &mut self,
        chat: &dyn ChatAgent,
        user: &mut dyn UserChannel,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        loop {
            if let Some(termination) = self.planner.termination(&self.history) {
                return Ok(termination.into());
            }
            let Some(current) = self.planner.current().cloned() else {
                return Ok(SessionOutcome::DeadEnd);
            };
            let graph = Arc::clone(self.planner.graph());
            let Some(subtask) = graph.subtask(&current) else {
                return Ok(SessionOutcome::DeadEnd);
            };

            let turn = self.planner.turns_taken() + 1;
            let candidates = self.planner.candidates(&self.history);
            self.trace.touch(&current, turn);
            debug!(
                target = "mygo::session",
                turn,
                subtask = %current,
                candidates = candidates.len(),
                event = "turn_started"
            );

            // system speaks
            let candidate_tasks: Vec<&SubTask> =
                candidates.iter().filter_map(|id| graph.subtask(id)).collect();
            let request = ChatRequest {
                task: &self.config.task,
                subtask,
                candidates: &candidate_tasks,
                history: &self.history,
                turn,
            };
            let utterance = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(turn)),
                reply = chat.respond(request) => reply?,
            };
            self.history.push_system(turn, Some(current.clone()), utterance);

            // user replies
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(turn)),
                reply = user.next_utterance(&self.history) => reply?,
            };
            let Some(reply) = reply else {
                info!(target = "mygo::session", turn, event = "user_disconnected");
                return Ok(SessionOutcome::Abandoned);
            };
            if let Err(err) = self.history.push_user(turn, Some(current.clone()), reply) {
                warn!(target = "mygo::session", turn, error = %err, event = "utterance_dropped");
            }

            // decide and commit; the reply may have opened a conditional branch
            let candidates = self.planner.candidates(&self.history);
            let revisitable = self.planner.revisitable();
            let decision = self.decision_maker.decide(&DecisionInput {
                graph: &graph,
                history: &self.history,
                current: &current,
                candidates: &candidates,
                revisitable: &revisitable,
            });
            let transition = match self.planner.commit(&decision, &self.history) {
                Ok(transition) => transition,
                Err(err) => {
                    warn!(
                        target = "mygo::session",
                        turn,
                        decision = %decision,
                        error = %err,
                        event = "decision_rejected"
                    );
                    self.trace.reject(turn, &decision, &err);
                    Transition::Stayed
                }
            };
            self.trace.apply(&transition);
            self.planner.record_turn();

            if let Decision::Fail(reason) = decision {
                return Ok(reason.into());
            }
        }
    }

    async fn say_farewell(
        &mut self,
        chat: &dyn ChatAgent,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let farewell = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            farewell = chat.farewell(&self.history) => farewell?,
        };
        if let Some(text) = farewell {
            let turn = self.planner.turns_taken() + 1;
            self.history.push_system(turn, None, text);
        }
        Ok(())
    }

    fn cancelled(&self, turn: usize) -> SessionOutcome {
        warn!(target = "mygo::session", turn, event = "session_cancelled");
        SessionOutcome::Abandoned
    }

    fn report(&self, outcome: SessionOutcome) -> SessionReport {
        SessionReport {
            outcome,
            turns: self.planner.turns_taken(),
            trace: self.trace.clone(),
            progress: self.planner.progress(),
            history: self.history.clone(),
            final_state: self.planner.state().clone(),
        }
    }
}
