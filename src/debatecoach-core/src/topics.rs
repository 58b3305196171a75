//! Debate topic proposals.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::book::Book;
use crate::completion::{CompletionService, ask_within};
use crate::config::{Config, render};
use crate::error::DebateError;

/// Leading enumeration such as `1)`, `2.` or `3 `.
static ENUMERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[). ]+").expect("valid enumeration pattern"));

/// Clean a free-text completion into candidate topics, one per non-blank line.
pub fn propose_topics(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| ENUMERATION.replace(line, "").trim().to_string())
        .filter(|topic| !topic.is_empty())
}

/// Ask the completion service for debate topics about `book`.
pub async fn generate_topics(
    service: &dyn CompletionService,
    config: &Config,
    book: &Book,
) -> Result<Vec<String>, DebateError> {
    let prompt = render(
        &config.prompts.topics,
        &[("book_title", book.title.as_str()), ("synopsis", book.synopsis_or_default())],
    );

    let reply = ask_within(service, &prompt, config.completion.timeout()).await?;
    let topics: Vec<String> = propose_topics(&reply).collect();
    if topics.is_empty() {
        warn!(book = %book.title, "completion produced no topics");
        return Err(DebateError::NoTopics);
    }
    Ok(topics)
}
