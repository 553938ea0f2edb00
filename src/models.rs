use serde::{Deserialize, Serialize};

/// A highlighted passage or annotation, identified by its location in the book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Note {
    pub location: String,
    pub text: String,
}

impl Note {
    pub fn new(location: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            text: text.into(),
        }
    }
}

/// A book and every note ingested for it so far.
///
/// Identity is the (author, title) pair compared case-insensitively; no two
/// notes in a book share a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Book {
    pub author: String,
    pub title: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Book {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
            notes: Vec::new(),
        }
    }

    /// True when this book is the one identified by `author` and `title`.
    pub fn matches(&self, author: &str, title: &str) -> bool {
        normalize_identity(&self.author) == normalize_identity(author)
            && normalize_identity(&self.title) == normalize_identity(title)
    }
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.author, &other.title)
    }
}

impl Eq for Book {}

impl std::fmt::Display for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Title: {} - Author: {}", self.title, self.author)
    }
}

fn normalize_identity(value: &str) -> String {
    value.trim().to_lowercase()
}
