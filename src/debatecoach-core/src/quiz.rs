//! Reading quiz generation and grading.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::book::Book;
use crate::completion::{CompletionService, ask_within};
use crate::config::{Config, PromptsConfig, render};
use crate::error::DebateError;

/// One multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// A generated quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quiz {
    #[serde(rename = "quiz")]
    pub items: Vec<QuizItem>,
}

#[derive(Deserialize)]
struct QuizEnvelope {
    quiz: Option<Vec<QuizItem>>,
}

impl Quiz {
    /// Number of answers matching the correct option, position by position.
    pub fn correct_count(&self, answers: &[String]) -> usize {
        self.items
            .iter()
            .zip(answers)
            .filter(|(item, answer)| item.correct_answer == **answer)
            .count()
    }
}

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(text: &str) -> String {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    let text = text.trim();
    match text.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("json") => text[4..].trim().to_string(),
        _ => text.to_string(),
    }
}

/// Parse a completion into a quiz, keeping the cleaned text on failure.
pub fn parse_quiz(raw: &str) -> Result<Quiz, DebateError> {
    let cleaned = strip_code_fences(raw);
    let malformed = |reason: String| DebateError::MalformedQuiz {
        reason,
        raw: cleaned.clone(),
    };

    let envelope: QuizEnvelope =
        serde_json::from_str(&cleaned).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let items = envelope
        .quiz
        .ok_or_else(|| malformed("missing 'quiz' key".to_string()))?;
    if items.is_empty() {
        return Err(malformed("no questions".to_string()));
    }
    if let Some(item) = items.iter().find(|item| item.options.is_empty()) {
        return Err(malformed(format!("question '{}' has no options", item.question)));
    }

    Ok(Quiz { items })
}

pub fn quiz_prompt(prompts: &PromptsConfig, book: &Book) -> String {
    render(
        &prompts.quiz,
        &[("book_title", book.title.as_str()), ("synopsis", book.synopsis_or_default())],
    )
}

/// Ask the completion service for a quiz about `book`.
pub async fn generate_quiz(
    service: &dyn CompletionService,
    config: &Config,
    book: &Book,
) -> Result<Quiz, DebateError> {
    let prompt = quiz_prompt(&config.prompts, book);
    let reply = ask_within(service, &prompt, config.completion.timeout()).await?;
    parse_quiz(&reply).inspect_err(|e| warn!(book = %book.title, error = %e, "quiz rejected"))
}

/// Grading request listing every question with the student's answer.
pub fn grading_prompt(
    prompts: &PromptsConfig,
    quiz: &Quiz,
    answers: &[String],
) -> Result<String, DebateError> {
    if answers.len() != quiz.items.len() {
        return Err(DebateError::AnswerCountMismatch {
            expected: quiz.items.len(),
            actual: answers.len(),
        });
    }

    let questions: String = quiz
        .items
        .iter()
        .zip(answers)
        .enumerate()
        .map(|(i, (item, answer))| {
            format!(
                "Question {}: {}\nOptions: {}\nCorrect answer: {}\nStudent's answer: {}\n\n",
                i + 1,
                item.question,
                item.options.join(", "),
                item.correct_answer,
                answer
            )
        })
        .collect();

    Ok(render(&prompts.quiz_grading, &[("questions", questions.as_str())]))
}

/// Have the completion service mark the student's answers.
pub async fn grade_quiz(
    service: &dyn CompletionService,
    config: &Config,
    quiz: &Quiz,
    answers: &[String],
) -> Result<String, DebateError> {
    let prompt = grading_prompt(&config.prompts, quiz, answers)?;
    Ok(ask_within(service, &prompt, config.completion.timeout()).await?)
}
