//! Kindle clippings export parsing.
//!
//! Amazon mails highlights as a CSV-like attachment with no published
//! grammar. The parsers in this module encode the shape observed in live
//! exports and fail loudly the moment that shape changes, so a human can
//! look at the offending text before data loss compounds.
//!
//! # Layout of an export
//!
//! ```text
//! 0      Your Kindle Notes For:
//! 1      "Title Of The Book"
//! 2      "by Lastname, Firstname"
//! 3..7   boilerplate and separators
//! 8..N-1 "<meta>","Location <n>[-<m>]","","<highlighted text>"
//! N      trailing separator
//! ```
//!
//! - **`highlight`**: one highlight block → `(location, text)`
//! - **`document`**: the whole export → title, author and ordered highlights
//!
//! Deduplication is not done here; repeated locations are preserved in
//! source order and resolved by the catalog merge.

pub mod document;
pub mod highlight;

pub use document::{ClippingsDocument, parse_document};
pub use highlight::{Highlight, parse_highlight};

use thiserror::Error;

/// Errors raised when an export no longer matches the known shape.
#[derive(Debug, Error)]
pub enum ClippingsError {
    #[error("malformed highlight record ({reason}): `{raw}`")]
    MalformedRecord { reason: String, raw: String },
    #[error("malformed clippings document ({reason}): `{raw}`")]
    MalformedDocument { reason: String, raw: String },
    #[error("malformed clippings document: highlight on line {line_index} `{raw}` failed: {source}")]
    InvalidRecord {
        line_index: usize,
        raw: String,
        #[source]
        source: Box<ClippingsError>,
    },
}

impl ClippingsError {
    pub(crate) fn record(reason: impl Into<String>, raw: &str) -> Self {
        ClippingsError::MalformedRecord {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    pub(crate) fn document(reason: impl Into<String>, raw: &str) -> Self {
        ClippingsError::MalformedDocument {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

/// Title-case a piece of text.
///
/// The first letter of every whitespace-delimited word is upper-cased and
/// the rest of the word lower-cased. Whitespace is kept as-is.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;

    for ch in text.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            at_word_start = false;
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
    }

    out
}
