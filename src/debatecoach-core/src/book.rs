//! Book metadata supplied by the search collaborator.

use serde::{Deserialize, Serialize};

/// Placeholder used when a book has no synopsis.
pub const NO_SYNOPSIS: &str = "No synopsis available.";

/// Placeholder used when no book has been selected.
pub const NO_TITLE: &str = "No title available.";

/// A selected book. Every field is opaque text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
}

impl Book {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.synopsis = Some(synopsis.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn synopsis_or_default(&self) -> &str {
        self.synopsis
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_SYNOPSIS)
    }

    /// "title | author | publisher", skipping missing parts.
    pub fn display_line(&self) -> String {
        [Some(self.title.as_str()), self.author.as_deref(), self.publisher.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_synopsis_uses_placeholder() {
        assert_eq!(Book::new("T").synopsis_or_default(), NO_SYNOPSIS);
        assert_eq!(Book::new("T").with_synopsis("  ").synopsis_or_default(), NO_SYNOPSIS);
        assert_eq!(Book::new("T").with_synopsis("Plot").synopsis_or_default(), "Plot");
    }

    #[test]
    fn test_display_line_skips_missing_parts() {
        assert_eq!(Book::new("Matilda").display_line(), "Matilda");
        assert_eq!(
            Book::new("Matilda").with_author("Roald Dahl").display_line(),
            "Matilda | Roald Dahl"
        );
    }
}
