//! Constraints gating transitions between sub-tasks.
//!
//! A constraint is attached either to a sub-task (gating entry into it) or to
//! a dependency edge (gating that edge). Each rule belongs to one of four
//! dimensions and is evaluated against an [`EvalContext`] built fresh on
//! every query, so constraints never cache results between turns.

use super::SubTaskId;
use crate::history::DialogueHistory;
use crate::planner::{ProgressState, SubTaskStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// The four dimensions a constraint can restrict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintDimension {
    /// Turn-index windows.
    Temporal,
    /// Information the user must have provided.
    Content,
    /// Remaining turn budget.
    Resource,
    /// Cross-branch ordering without a dependency edge.
    Ordering,
}

/// What a constraint is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintScope {
    /// Gates entry into the sub-task.
    SubTask(SubTaskId),
    /// Gates the dependency edge `source -> target`.
    Edge { source: SubTaskId, target: SubTaskId },
}

/// The predicate a constraint evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ConstraintRule {
    /// Holds while the current turn index lies in `[min, max]`.
    TurnWindow {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// Holds once any user utterance mentions one of the keywords.
    Mentions { keywords: Vec<String> },
    /// Holds while at least `at_least` turns remain in the budget.
    RemainingTurns { at_least: usize },
    /// Holds once every listed sub-task is completed.
    After { subtasks: Vec<SubTaskId> },
}

impl ConstraintRule {
    /// Returns the dimension this rule restricts.
    pub fn dimension(&self) -> ConstraintDimension {
        match self {
            ConstraintRule::TurnWindow { .. } => ConstraintDimension::Temporal,
            ConstraintRule::Mentions { .. } => ConstraintDimension::Content,
            ConstraintRule::RemainingTurns { .. } => ConstraintDimension::Resource,
            ConstraintRule::After { .. } => ConstraintDimension::Ordering,
        }
    }
}

/// A predicate gating whether a transition is legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub scope: ConstraintScope,
    #[serde(flatten)]
    pub rule: ConstraintRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Constraint {
    /// Creates a constraint gating entry into `subtask`.
    pub fn on_subtask(subtask: impl Into<SubTaskId>, rule: ConstraintRule) -> Self {
        Self {
            scope: ConstraintScope::SubTask(subtask.into()),
            rule,
            description: None,
        }
    }

    /// Creates a constraint gating the edge `source -> target`.
    pub fn on_edge(
        source: impl Into<SubTaskId>,
        target: impl Into<SubTaskId>,
        rule: ConstraintRule,
    ) -> Self {
        Self {
            scope: ConstraintScope::Edge {
                source: source.into(),
                target: target.into(),
            },
            rule,
            description: None,
        }
    }

    /// Attaches a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the dimension of this constraint.
    pub fn dimension(&self) -> ConstraintDimension {
        self.rule.dimension()
    }

    /// Evaluates the constraint.
    pub fn holds(&self, state: &ProgressState, ctx: &EvalContext<'_>) -> bool {
        match &self.rule {
            ConstraintRule::TurnWindow { min, max } => {
                min.is_none_or(|min| ctx.turn >= min) && max.is_none_or(|max| ctx.turn <= max)
            }
            ConstraintRule::Mentions { keywords } => ctx
                .history
                .turns()
                .iter()
                .filter(|turn| turn.speaker.is_user())
                .any(|turn| mentions_any(&turn.utterance, keywords)),
            ConstraintRule::RemainingTurns { at_least } => ctx
                .remaining_turns
                .is_none_or(|remaining| remaining >= *at_least),
            ConstraintRule::After { subtasks } => subtasks
                .iter()
                .all(|id| {
                    ctx.assume_completed == Some(id)
                        || matches!(state.status(id), Some(SubTaskStatus::Completed))
                }),
        }
    }
}

/// Dialogue-side inputs for constraint and condition evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// The dialogue so far.
    pub history: &'a DialogueHistory,
    /// The turn about to be taken (1-based).
    pub turn: usize,
    /// Turns left in the budget, `None` when unbounded.
    pub remaining_turns: Option<usize>,
    /// Sub-task to treat as completed when evaluating ordering rules.
    pub assume_completed: Option<&'a SubTaskId>,
}

impl<'a> EvalContext<'a> {
    /// Creates a context without a turn budget.
    pub fn new(history: &'a DialogueHistory, turn: usize) -> Self {
        Self {
            history,
            turn,
            remaining_turns: None,
            assume_completed: None,
        }
    }

    /// Sets the remaining turn budget.
    pub fn with_remaining_turns(mut self, remaining: Option<usize>) -> Self {
        self.remaining_turns = remaining;
        self
    }

    /// Returns a copy that treats `subtask` as already completed.
    pub fn assuming_completed(mut self, subtask: &'a SubTaskId) -> Self {
        self.assume_completed = Some(subtask);
        self
    }
}

/// Case-insensitive whole-word match of any keyword in `text`.
pub(crate) fn mentions_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| mentions(text, keyword))
}

/// Case-insensitive whole-word (or whole-phrase) match.
///
/// Word boundaries are only required on the sides where the keyword starts or
/// ends with a word character, so `C++` and `$100` match as written.
pub(crate) fn mentions(text: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return false;
    }
    match keyword_matcher(keyword) {
        Some(re) => re.is_match(text),
        None => text.to_lowercase().contains(&keyword.to_lowercase()),
    }
}

/// Compiled matchers, shared across sessions. Keywords come from graphs and
/// configuration, so the set stays small.
fn keyword_matcher(keyword: &str) -> Option<Regex> {
    static MATCHERS: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();
    let matchers = MATCHERS.get_or_init(Default::default);

    if let Some(re) = matchers.read().ok().and_then(|m| m.get(keyword).cloned()) {
        return Some(re);
    }
    let re = Regex::new(&keyword_pattern(keyword)).ok()?;
    if let Ok(mut m) = matchers.write() {
        m.insert(keyword.to_string(), re.clone());
    }
    Some(re)
}

fn keyword_pattern(keyword: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = if keyword.starts_with(is_word) { r"\b" } else { "" };
    let trail = if keyword.ends_with(is_word) { r"\b" } else { "" };
    format!("(?i){lead}{}{trail}", regex::escape(keyword))
}
