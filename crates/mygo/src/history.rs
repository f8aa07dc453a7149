//! Append-only dialogue history.

use crate::graph::SubTaskId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The orchestrated chat agent.
    System,
    User,
}

impl Speaker {
    pub fn is_user(&self) -> bool {
        matches!(self, Speaker::User)
    }

    /// Display name used in transcripts.
    pub fn name(&self) -> &'static str {
        match self {
            Speaker::System => "System",
            Speaker::User => "User",
        }
    }
}

/// A single utterance in the dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Turn index (1-based) the utterance belongs to.
    pub turn: usize,
    pub speaker: Speaker,
    pub utterance: String,
    /// Sub-task that was active when the utterance was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtask: Option<SubTaskId>,
    pub recorded_at_ms: u64,
}

impl DialogueTurn {
    /// Formats this turn for display in a transcript.
    pub fn format(&self) -> String {
        format!("[{}]: {}", self.speaker.name(), self.utterance)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Utterance is empty")]
    EmptyUtterance,
}

/// The ordered record of every utterance in a session.
///
/// Entries are only ever appended; nothing is rewritten or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueHistory {
    turns: Vec<DialogueTurn>,
}

impl DialogueHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system utterance.
    pub fn push_system(
        &mut self,
        turn: usize,
        subtask: Option<SubTaskId>,
        utterance: impl Into<String>,
    ) {
        self.turns.push(DialogueTurn {
            turn,
            speaker: Speaker::System,
            utterance: utterance.into(),
            subtask,
            recorded_at_ms: current_timestamp_ms(),
        });
    }

    /// Appends a user utterance. Empty or whitespace-only text is rejected.
    pub fn push_user(
        &mut self,
        turn: usize,
        subtask: Option<SubTaskId>,
        utterance: impl Into<String>,
    ) -> Result<(), HistoryError> {
        let utterance = utterance.into();
        if utterance.trim().is_empty() {
            return Err(HistoryError::EmptyUtterance);
        }
        self.turns.push(DialogueTurn {
            turn,
            speaker: Speaker::User,
            utterance,
            subtask,
            recorded_at_ms: current_timestamp_ms(),
        });
        Ok(())
    }

    pub fn turns(&self) -> &[DialogueTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&DialogueTurn> {
        self.turns.last()
    }

    /// The most recent user utterance, if any.
    pub fn last_user_utterance(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.speaker.is_user())
            .map(|t| t.utterance.as_str())
    }

    /// The trailing run of utterances recorded under `subtask`.
    ///
    /// This is the dialogue since the sub-task most recently became active.
    pub fn since_subtask(&self, subtask: &SubTaskId) -> &[DialogueTurn] {
        let start = self
            .turns
            .iter()
            .rposition(|t| t.subtask.as_ref() != Some(subtask))
            .map_or(0, |i| i + 1);
        &self.turns[start..]
    }

    /// Every user utterance recorded under `subtask`, oldest first.
    pub fn user_utterances_for<'a>(
        &'a self,
        subtask: &'a SubTaskId,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.turns
            .iter()
            .filter(move |t| t.speaker.is_user() && t.subtask.as_ref() == Some(subtask))
            .map(|t| t.utterance.as_str())
    }

    /// The last `n` utterances.
    pub fn window(&self, n: usize) -> &[DialogueTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    /// Renders the whole history as a transcript.
    pub fn format_transcript(&self) -> String {
        format_turns(&self.turns)
    }
}

/// Renders turns one per line.
pub fn format_turns(turns: &[DialogueTurn]) -> String {
    turns
        .iter()
        .map(DialogueTurn::format)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the current timestamp in milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Option<SubTaskId> {
        Some(SubTaskId::from(s))
    }

    #[test]
    fn test_push_user_rejects_empty() {
        let mut history = DialogueHistory::new();
        assert_eq!(history.push_user(1, None, "   "), Err(HistoryError::EmptyUtterance));
        assert_eq!(history.push_user(1, None, ""), Err(HistoryError::EmptyUtterance));
        assert!(history.is_empty());
    }

    #[test]
    fn test_since_subtask_returns_trailing_run() {
        let mut history = DialogueHistory::new();
        history.push_system(1, id("a"), "Hello");
        history.push_user(1, id("a"), "Hi").unwrap();
        history.push_system(2, id("b"), "Your name?");
        history.push_user(2, id("b"), "Ann").unwrap();
        history.push_system(3, id("a"), "Back to greeting");

        assert_eq!(history.since_subtask(&"a".into()).len(), 1);
        assert!(history.since_subtask(&"b".into()).is_empty());
        assert_eq!(history.since_subtask(&"a".into())[0].utterance, "Back to greeting");
    }

    #[test]
    fn test_since_subtask_covers_whole_history() {
        let mut history = DialogueHistory::new();
        history.push_system(1, id("a"), "Hello");
        history.push_user(1, id("a"), "Hi").unwrap();
        assert_eq!(history.since_subtask(&"a".into()).len(), 2);
    }

    #[test]
    fn test_user_utterances_for() {
        let mut history = DialogueHistory::new();
        history.push_system(1, id("a"), "Basic or premium?");
        history.push_user(1, id("a"), "premium").unwrap();
        history.push_user(2, id("b"), "other").unwrap();

        let a = SubTaskId::from("a");
        let utterances: Vec<&str> = history.user_utterances_for(&a).collect();
        assert_eq!(utterances, vec!["premium"]);
    }

    #[test]
    fn test_window_and_transcript() {
        let mut history = DialogueHistory::new();
        history.push_system(1, None, "Hello");
        history.push_user(1, None, "Hi").unwrap();
        history.push_system(2, None, "Bye");

        assert_eq!(history.window(2).len(), 2);
        assert_eq!(history.window(10).len(), 3);
        assert_eq!(history.last_user_utterance(), Some("Hi"));
        assert_eq!(
            history.format_transcript(),
            "[System]: Hello\n[User]: Hi\n[System]: Bye"
        );
    }
}
