//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::completion::retry_backoff;
use crate::error::DebateError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub completion: CompletionConfig,
    pub prompts: PromptsConfig,
}

/// Parameters for every completion request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on a single completion call, retries included.
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.5,
            max_tokens: 800,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Share of [`timeout`](Self::timeout) given to each HTTP attempt, so
    /// that every retry and the pauses between them fit inside the whole
    /// call's limit.
    pub fn attempt_timeout(&self) -> Duration {
        let attempts = self.max_retries.max(1);
        let pauses: u64 = (1..attempts).map(|retry| retry_backoff(retry).as_secs()).sum();
        Duration::from_secs(self.timeout_secs.saturating_sub(pauses).max(1)) / attempts
    }
}

/// Prompt templates. Placeholders are written as `{name}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Seed instructions: `{topic}`, `{agenda}`, `{user_side}`, `{bot_side}`.
    pub system: String,
    /// Cue for an ordinary bot round: `{round_title}`.
    pub round_cue: String,
    /// Cue when the bot opens for Pro against a Con user:
    /// `{round_title}`, `{next_round_title}`.
    pub opening_handoff: String,
    pub evaluation: String,
    /// `{book_title}`, `{synopsis}`.
    pub topics: String,
    /// `{book_title}`, `{synopsis}`.
    pub quiz: String,
    /// `{questions}`.
    pub quiz_grading: String,
    /// `{book_title}`, `{synopsis}`, `{essay}`.
    pub essay_feedback: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            round_cue: "[{round_title}]".to_string(),
            opening_handoff: DEFAULT_OPENING_HANDOFF.to_string(),
            evaluation: DEFAULT_EVALUATION_PROMPT.to_string(),
            topics: DEFAULT_TOPICS_PROMPT.to_string(),
            quiz: DEFAULT_QUIZ_PROMPT.to_string(),
            quiz_grading: DEFAULT_QUIZ_GRADING_PROMPT.to_string(),
            essay_feedback: DEFAULT_ESSAY_FEEDBACK_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

/// Replace every `{key}` in `template` with its value.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a reading-debate partner for a student. The topic of this debate is '{topic}'.
The debate proceeds in this order:
{agenda}
The student argues the {user_side} side and you argue the {bot_side} side.
In every round, state the round title first and then give your argument.
When the debate is over, evaluate both sides out of 100 points, saying which side was more persuasive and why."#;

const DEFAULT_OPENING_HANDOFF: &str = "[{round_title}] In this debate you present the Pro opening first. At the end of your reply, add 'Please give the {next_round_title}.'";

const DEFAULT_EVALUATION_PROMPT: &str = "The debate is over. Based on the conversation above, score which side, Pro or Con, was more persuasive out of 100 points, and give specific feedback explaining why.";

const DEFAULT_TOPICS_PROMPT: &str = r#"Based on the synopsis of the book '{book_title}', suggest 2 debate topics that an elementary school student can understand. Print each topic on its own line as plain text, without numbers or special characters.
Each topic must be something people can reasonably agree or disagree with, and must be phrased as a statement that "should" be done so the student can choose to be for or against it.

Synopsis:
{synopsis}"#;

const DEFAULT_QUIZ_PROMPT: &str = r#"Based on the synopsis of the book '{book_title}', create 3 multiple-choice reading quiz questions with 4 options each, in JSON. Use this output format:

{
  "quiz": [
    {
      "question": "question text",
      "options": ["option1", "option2", "option3", "option4"],
      "correct_answer": "option1"
    },
    ...
  ]
}

Output only JSON.

Synopsis:
{synopsis}"#;

const DEFAULT_QUIZ_GRADING_PROMPT: &str = r#"Here are reading quiz questions, their correct answers, and a student's answers.

{questions}
Mark each of the student's answers as right or wrong, and for wrong answers give the correct explanation with feedback. Finish with the final score and an overall comment."#;

const DEFAULT_ESSAY_FEEDBACK_PROMPT: &str = r#"Using the book's title and synopsis, give specific positive feedback and points to improve on the student's reading essay, then provide an example of the essay after those improvements.

Book title:
{book_title}

Book synopsis:
{synopsis}

Essay:
{essay}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_placeholders() {
        let text = render("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(text, "x and y and x");
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config = Config::from_str(
            r#"
            [completion]
            model = "llama3:8b"
            "#,
        )
        .unwrap();
        assert_eq!(config.completion.model, "llama3:8b");
        assert_eq!(config.completion.max_tokens, 800);
        assert_eq!(config.prompts.round_cue, "[{round_title}]");
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped = Config::from_str(include_str!("../../../config/debatecoach.toml")).unwrap();
        let defaults = default_config();
        assert_eq!(shipped.completion.model, defaults.completion.model);
        assert_eq!(shipped.completion.timeout_secs, defaults.completion.timeout_secs);
        assert_eq!(shipped.prompts.system, defaults.prompts.system);
        assert_eq!(shipped.prompts.opening_handoff, defaults.prompts.opening_handoff);
        assert_eq!(shipped.prompts.evaluation, defaults.prompts.evaluation);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let err = Config::from_str("[completion]\nmax_tokens = \"many\"").unwrap_err();
        assert!(matches!(err, DebateError::ConfigError(_)));
    }

    #[test]
    fn test_attempts_share_the_call_timeout() {
        let config = CompletionConfig::default();
        // 120s minus the 1s + 2s pauses, split over three attempts.
        assert_eq!(config.attempt_timeout(), Duration::from_secs(39));

        let single = CompletionConfig {
            max_retries: 1,
            ..CompletionConfig::default()
        };
        assert_eq!(single.attempt_timeout(), single.timeout());

        let tight = CompletionConfig {
            timeout_secs: 2,
            max_retries: 4,
            ..CompletionConfig::default()
        };
        assert!(tight.attempt_timeout() > Duration::ZERO);
    }
}
