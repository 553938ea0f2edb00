//! Whole-export parsing.

use super::highlight::{Highlight, parse_highlight};
use super::{ClippingsError, title_case};

/// Lines reserved for the fixed preamble before the first highlight block.
const PREAMBLE_LINES: usize = 8;

/// Smallest export that can be parsed: preamble, one block, trailing line.
pub const MIN_DOCUMENT_LINES: usize = PREAMBLE_LINES + 1;

const TITLE_LINE: usize = 1;
const AUTHOR_LINE: usize = 2;

/// A parsed clippings export for one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippingsDocument {
    pub title: String,
    pub author: String,
    /// Highlights in source order, duplicates preserved.
    pub highlights: Vec<Highlight>,
}

/// Split on newlines, tolerating `\r\n` line endings.
fn split_lines(raw: &str) -> Vec<&str> {
    raw.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Take the text before the first comma, strip quotes and title-case it.
///
/// Only the first comma-delimited token is kept, so `"Austen, Jane"` yields
/// `Austen`. Titles or names containing commas are truncated the same way.
fn extract_header_field(line: &str) -> String {
    let first = line.split(',').next().unwrap_or_default();
    let stripped = first.trim().trim_matches('"').trim();
    title_case(stripped)
}

fn header_field(lines: &[&str], index: usize, name: &str, raw: &str) -> Result<String, ClippingsError> {
    let value = extract_header_field(lines[index]);

    if value.is_empty() {
        log::warn!("could not extract {} from line {}: `{}`", name, index, lines[index]);
        return Err(ClippingsError::document(
            format!("empty {name} on line {index}"),
            raw,
        ));
    }

    Ok(value)
}

/// Parse a full clippings export.
///
/// Fails with [`ClippingsError::MalformedDocument`] when the export has
/// fewer than [`MIN_DOCUMENT_LINES`] lines or an empty title/author, and
/// with [`ClippingsError::InvalidRecord`] (carrying the offending line) when
/// any highlight block is malformed.
pub fn parse_document(raw: &str) -> Result<ClippingsDocument, ClippingsError> {
    let lines = split_lines(raw);

    if lines.len() < MIN_DOCUMENT_LINES {
        return Err(ClippingsError::document(
            format!(
                "expected at least {} lines, found {}",
                MIN_DOCUMENT_LINES,
                lines.len()
            ),
            raw,
        ));
    }

    let title = header_field(&lines, TITLE_LINE, "title", raw)?;
    let author = header_field(&lines, AUTHOR_LINE, "author", raw)?;

    // The last line is the trailing separator
    let block_lines = &lines[PREAMBLE_LINES..lines.len() - 1];

    let mut highlights = Vec::with_capacity(block_lines.len());
    for (offset, line) in block_lines.iter().enumerate() {
        let line_index = PREAMBLE_LINES + offset;
        let highlight = parse_highlight(line).map_err(|source| {
            log::debug!("highlight on line {} failed: {}", line_index, source);
            ClippingsError::InvalidRecord {
                line_index,
                raw: line.to_string(),
                source: Box::new(source),
            }
        })?;
        highlights.push(highlight);
    }

    log::debug!(
        "parsed `{}` by {}: {} highlight(s)",
        title,
        author,
        highlights.len()
    );

    Ok(ClippingsDocument {
        title,
        author,
        highlights,
    })
}
