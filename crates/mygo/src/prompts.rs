//! Prompt templates for the external language-model collaborators.
//!
//! The orchestration core does not call a model itself. These helpers render
//! the prompts a [`ChatAgent`](crate::session::ChatAgent) or an external
//! transition classifier would send, using `minijinja` templates.

use crate::graph::SubTask;
use crate::history::{DialogueHistory, format_turns};
use minijinja::Environment;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Template for the chat agent's next utterance.
pub const CHAT_TEMPLATE: &str = "\
You are guiding a user through the task: {{ task }}
Current sub-task: {{ subtask.description }}
{%- if subtask.criteria.items %}
Information still to obtain ({{ subtask.criteria.mode }} of):
{%- for item in subtask.criteria.items %}
- {{ item }}
{%- endfor %}
{%- endif %}
{%- if candidates %}
Possible next steps:
{%- for c in candidates %}
- {{ c.id }}: {{ c.description }}
{%- endfor %}
{%- endif %}
{%- if transcript %}

Conversation so far:
{{ transcript }}
{%- endif %}

Reply with a single, natural message that moves the current sub-task forward.";

/// Template for the transition classifier.
pub const TRANSITION_TEMPLATE: &str = "\
Current task: {{ current.id }}: {{ current.description }}
Possible next tasks:
{%- for c in candidates %}
- {{ c.id }}: {{ c.description }}
{%- else %}
- none
{%- endfor %}
User's latest reply: {{ reply }}

Option 1: stay on the current task.
Option 2: move to one of the possible next tasks.
Answer with the option and, for option 2, the id of the next task.";

/// Renders a prompt from a template string and a serializable context.
pub fn render_prompt<T: Serialize>(template: &str, context: T) -> Result<String, PromptError> {
    let mut env = Environment::new();
    env.add_template("prompt", template)?;
    let tmpl = env.get_template("prompt")?;
    Ok(tmpl.render(context)?)
}

/// What the chat agent needs to produce its next utterance.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// Overall objective
    pub task: &'a str,
    pub subtask: &'a SubTask,
    pub candidates: &'a [&'a SubTask],
    pub history: &'a DialogueHistory,
    /// Turn being taken (1-based)
    pub turn: usize,
}

impl ChatRequest<'_> {
    /// Renders [`CHAT_TEMPLATE`] for this request.
    pub fn render(&self) -> Result<String, PromptError> {
        self.render_with(CHAT_TEMPLATE)
    }

    /// Renders a custom template with the same context.
    ///
    /// Available variables: `task`, `subtask`, `candidates`, `transcript`, `turn`.
    pub fn render_with(&self, template: &str) -> Result<String, PromptError> {
        render_prompt(
            template,
            json!({
                "task": self.task,
                "subtask": self.subtask,
                "candidates": self.candidates,
                "transcript": format_turns(self.history.turns()),
                "turn": self.turn,
            }),
        )
    }
}

/// Renders the prompt asking a classifier whether to stay or move.
pub fn render_transition_prompt(
    current: &SubTask,
    candidates: &[&SubTask],
    reply: &str,
) -> Result<String, PromptError> {
    render_prompt(
        TRANSITION_TEMPLATE,
        json!({
            "current": current,
            "candidates": candidates,
            "reply": reply,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CompletionCriteria;

    #[test]
    fn test_render_prompt() {
        let out = render_prompt("Hello {{ name }}", json!({"name": "mygo"})).unwrap();
        assert_eq!(out, "Hello mygo");
    }

    #[test]
    fn test_render_prompt_reports_syntax_errors() {
        assert!(render_prompt("{% if %}", json!({})).is_err());
    }

    #[test]
    fn test_chat_request_render() {
        let subtask = SubTask::new("collect", "Collect contact details")
            .with_criteria(CompletionCriteria::all(["name", "phone"]));
        let next = SubTask::new("confirm", "Confirm the order");
        let mut history = DialogueHistory::new();
        history.push_system(1, Some("collect".into()), "May I have your name?");
        history.push_user(1, Some("collect".into()), "Ann").unwrap();

        let candidates = [&next];
        let request = ChatRequest {
            task: "Register a customer",
            subtask: &subtask,
            candidates: &candidates,
            history: &history,
            turn: 2,
        };
        let prompt = request.render().unwrap();

        assert!(prompt.contains("task: Register a customer"));
        assert!(prompt.contains("Current sub-task: Collect contact details"));
        assert!(prompt.contains("(all of)"));
        assert!(prompt.contains("- phone"));
        assert!(prompt.contains("- confirm: Confirm the order"));
        assert!(prompt.contains("[User]: Ann"));
    }

    #[test]
    fn test_transition_prompt() {
        let current = SubTask::new("N1", "Greeting");
        let next = SubTask::new("N2", "Collect user information");
        let prompt = render_transition_prompt(&current, &[&next], "Hi, I'm Ann").unwrap();

        assert!(prompt.contains("Current task: N1: Greeting"));
        assert!(prompt.contains("- N2: Collect user information"));
        assert!(prompt.contains("User's latest reply: Hi, I'm Ann"));

        let prompt = render_transition_prompt(&current, &[], "ok").unwrap();
        assert!(prompt.contains("- none"));
    }
}
