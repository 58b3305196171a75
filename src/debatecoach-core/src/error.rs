//! Error types for the debate system.

use thiserror::Error;

use crate::completion::CompletionError;
use crate::debate_format::Round;
use crate::orchestrator::DebateState;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Debate topic must not be empty")]
    EmptyTopic,

    #[error("{round} is your turn: a statement is required")]
    MissingStatement { round: Round },

    #[error("Cannot {operation} while the debate is {state}")]
    InvalidState {
        operation: &'static str,
        state: DebateState,
    },

    #[error("No debate in progress for session '{0}'")]
    SessionNotFound(String),

    #[error("Completion service error: {0}")]
    Completion(#[from] CompletionError),

    #[error("No topics produced")]
    NoTopics,

    #[error("Malformed quiz: {reason}\n{raw}")]
    MalformedQuiz { reason: String, raw: String },

    #[error("Expected {expected} quiz answers, got {actual}")]
    AnswerCountMismatch { expected: usize, actual: usize },

    #[error("Essay must not be empty")]
    EmptyEssay,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DebateError {
    /// Whether retrying the same call may succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DebateError::Completion(_))
    }
}
