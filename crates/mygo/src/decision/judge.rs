//! Completion judges.
//!
//! A judge looks at the dialogue since the current sub-task became active
//! and says whether its completion criteria are met. Judges are pure: the
//! same slice and criteria always yield the same answer.

use crate::graph::constraint::{mentions, mentions_any};
use crate::graph::{CompletionCriteria, MatchMode, SubTask, SubTaskId};
use crate::history::DialogueTurn;

/// Outcome of judging the current sub-task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Unsatisfied,
    Satisfied,
    /// The user gave up on the sub-task.
    Abandoned,
    /// The user asked to return to an abandoned sub-task.
    Revisit(SubTaskId),
}

/// Decides whether a sub-task's criteria are met by a slice of dialogue.
pub trait CompletionJudge: Send + Sync {
    /// Returns true if `slice` satisfies `criteria`.
    fn judge(&self, slice: &[DialogueTurn], criteria: &CompletionCriteria) -> bool;

    /// Classifies the slice for `subtask`.
    ///
    /// `revisitable` lists the sub-tasks the user may return to. The default
    /// only distinguishes satisfied from unsatisfied.
    fn verdict(
        &self,
        slice: &[DialogueTurn],
        subtask: &SubTask,
        revisitable: &[&SubTask],
    ) -> Verdict {
        let _ = revisitable;
        if self.judge(slice, &subtask.criteria) {
            Verdict::Satisfied
        } else {
            Verdict::Unsatisfied
        }
    }
}

/// Rule-based judge matching checklist items against the user's words.
///
/// Items match case-insensitively on word boundaries. An empty checklist is
/// met by any user reply. The latest user utterance is also checked for
/// abandon phrases and for requests to go back to an abandoned sub-task.
#[derive(Debug, Clone)]
pub struct KeywordJudge {
    abandon_phrases: Vec<String>,
    revisit_phrases: Vec<String>,
}

impl Default for KeywordJudge {
    fn default() -> Self {
        Self {
            abandon_phrases: default_abandon_phrases(),
            revisit_phrases: ["go back", "back to", "return to", "revisit"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Phrases that mark a sub-task as abandoned unless configured otherwise.
pub fn default_abandon_phrases() -> Vec<String> {
    [
        "skip",
        "skip this",
        "never mind",
        "not interested",
        "forget it",
        "rather not say",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl KeywordJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the abandon phrases.
    pub fn with_abandon_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abandon_phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the phrases that introduce a revisit request.
    pub fn with_revisit_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revisit_phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    fn revisit_target(&self, utterance: &str, revisitable: &[&SubTask]) -> Option<SubTaskId> {
        if !mentions_any(utterance, &self.revisit_phrases) {
            return None;
        }
        let lower = utterance.to_lowercase();
        revisitable
            .iter()
            .find(|s| {
                let description = s.description.trim().to_lowercase();
                mentions(utterance, s.id.as_str())
                    || (!description.is_empty() && lower.contains(&description))
            })
            .map(|s| s.id.clone())
    }
}

fn user_utterances(slice: &[DialogueTurn]) -> impl Iterator<Item = &str> {
    slice
        .iter()
        .filter(|t| t.speaker.is_user())
        .map(|t| t.utterance.as_str())
}

impl CompletionJudge for KeywordJudge {
    fn judge(&self, slice: &[DialogueTurn], criteria: &CompletionCriteria) -> bool {
        let utterances: Vec<&str> = user_utterances(slice).collect();
        if utterances.is_empty() {
            return false;
        }
        if criteria.is_empty() {
            return true;
        }

        let covered = |item: &String| utterances.iter().any(|u| mentions(u, item));
        match criteria.mode {
            MatchMode::All => criteria.items.iter().all(covered),
            MatchMode::Any => criteria.items.iter().any(covered),
        }
    }

    fn verdict(
        &self,
        slice: &[DialogueTurn],
        subtask: &SubTask,
        revisitable: &[&SubTask],
    ) -> Verdict {
        if let Some(latest) = user_utterances(slice).last() {
            if let Some(target) = self.revisit_target(latest, revisitable) {
                return Verdict::Revisit(target);
            }
            if mentions_any(latest, &self.abandon_phrases) {
                return Verdict::Abandoned;
            }
        }
        if self.judge(slice, &subtask.criteria) {
            Verdict::Satisfied
        } else {
            Verdict::Unsatisfied
        }
    }
}

/// Judge backed by a closure.
///
/// # Examples
///
/// ```
/// use mygo::decision::{CompletionJudge, FnJudge};
/// use mygo::graph::CompletionCriteria;
/// use mygo::history::DialogueTurn;
///
/// let judge = FnJudge::new(|slice: &[DialogueTurn], _: &CompletionCriteria| slice.len() >= 2);
/// assert!(!judge.judge(&[], &CompletionCriteria::default()));
/// ```
pub struct FnJudge<F> {
    f: F,
}

impl<F> FnJudge<F>
where
    F: Fn(&[DialogueTurn], &CompletionCriteria) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> CompletionJudge for FnJudge<F>
where
    F: Fn(&[DialogueTurn], &CompletionCriteria) -> bool + Send + Sync,
{
    fn judge(&self, slice: &[DialogueTurn], criteria: &CompletionCriteria) -> bool {
        (self.f)(slice, criteria)
    }
}
