//! Feedback on a student's reading essay.

use crate::book::{Book, NO_SYNOPSIS, NO_TITLE};
use crate::completion::{CompletionService, ask_within};
use crate::config::{Config, render};
use crate::error::DebateError;

/// Ask for praise, improvements and a revised example of `essay`.
///
/// Works without a selected book; placeholders stand in for its title and
/// synopsis.
pub async fn essay_feedback(
    service: &dyn CompletionService,
    config: &Config,
    book: Option<&Book>,
    essay: &str,
) -> Result<String, DebateError> {
    if essay.trim().is_empty() {
        return Err(DebateError::EmptyEssay);
    }

    let (title, synopsis) = match book {
        Some(book) => (book.title.as_str(), book.synopsis_or_default()),
        None => (NO_TITLE, NO_SYNOPSIS),
    };

    let prompt = render(
        &config.prompts.essay_feedback,
        &[("book_title", title), ("synopsis", synopsis), ("essay", essay)],
    );

    Ok(ask_within(service, &prompt, config.completion.timeout()).await?)
}
