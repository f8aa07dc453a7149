//! Configuration for session execution behavior.

use crate::decision::default_abandon_phrases;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a dialogue session.
///
/// Every field has a default, so a JSON document only needs the values it
/// overrides.
///
/// # Examples
///
/// ```
/// use mygo::config::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_task("Register a new customer")
///     .with_max_turns(Some(12));
/// assert_eq!(config.max_turns, Some(12));
///
/// let parsed = SessionConfig::from_json_str(r#"{"max_turns": 8}"#).unwrap();
/// assert_eq!(parsed.max_turns, Some(8));
/// assert!(parsed.farewell);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Overall objective shown to the chat agent.
    #[serde(default)]
    pub task: String,

    /// Maximum number of turns before the session ends with `BudgetExhausted`.
    ///
    /// `None` removes the budget.
    ///
    /// **Default:** 20
    #[serde(default = "default_max_turns")]
    pub max_turns: Option<usize>,

    /// How many trailing utterances the decision maker judges.
    ///
    /// **Default:** `None` (everything since the sub-task became active)
    #[serde(default)]
    pub history_window: Option<usize>,

    /// Whether the chat agent says goodbye after a successful session.
    ///
    /// **Default:** true
    #[serde(default = "default_farewell")]
    pub farewell: bool,

    /// Phrases that make the rule-based judge treat a sub-task as abandoned.
    #[serde(default = "default_abandon_phrases")]
    pub abandon_phrases: Vec<String>,
}

fn default_max_turns() -> Option<usize> {
    Some(20)
}

fn default_farewell() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            task: String::new(),
            max_turns: default_max_turns(),
            history_window: None,
            farewell: default_farewell(),
            abandon_phrases: default_abandon_phrases(),
        }
    }
}

impl SessionConfig {
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: Option<usize>) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_history_window(mut self, window: Option<usize>) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_farewell(mut self, farewell: bool) -> Self {
        self.farewell = farewell;
        self
    }

    pub fn with_abandon_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abandon_phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    /// Parses a JSON document and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == Some(0) {
            return Err(ConfigError::Invalid("max_turns must be at least 1".into()));
        }
        if self.history_window == Some(0) {
            return Err(ConfigError::Invalid(
                "history_window must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_turns, Some(20));
        assert_eq!(config.history_window, None);
        assert!(config.farewell);
        assert!(!config.abandon_phrases.is_empty());
    }

    #[test]
    fn test_json_overrides_keep_defaults() {
        let config = SessionConfig::from_json_str(
            r#"{"task": "Book a table", "history_window": 4, "farewell": false}"#,
        )
        .unwrap();
        assert_eq!(config.task, "Book a table");
        assert_eq!(config.history_window, Some(4));
        assert!(!config.farewell);
        assert_eq!(config.max_turns, Some(20));
    }

    #[test]
    fn test_null_max_turns_removes_budget() {
        let config = SessionConfig::from_json_str(r#"{"max_turns": null}"#).unwrap();
        assert_eq!(config.max_turns, None);
    }

    #[test]
    fn test_rejects_zero_budget() {
        let err = SessionConfig::from_json_str(r#"{"max_turns": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_turns": 7, "abandon_phrases": ["pass"]}}"#).unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.max_turns, Some(7));
        assert_eq!(config.abandon_phrases, vec!["pass"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SessionConfig::load("/nonexistent/mygo.json").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
