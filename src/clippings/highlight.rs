//! Highlight block parsing.
//!
//! A highlight block is one line of the export:
//!
//! ```text
//! "Highlight (Yellow)","Location 584","","it is a truth universally acknowledged"
//! ```
//!
//! Splitting on the quote character and dropping empty fragments and the
//! bare `,` separators leaves `[meta, location, text]`.

use super::{ClippingsError, title_case};

const QUOTE: char = '"';
const SEPARATOR: &str = ",";
const LOCATION_MARKER: &str = "location";

/// A single parsed highlight: where it sits in the book and what it says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub location: String,
    pub text: String,
}

impl Highlight {
    pub fn new(location: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            text: text.into(),
        }
    }
}

/// Split a raw block into its non-empty payload fragments.
fn payload_fragments(raw: &str) -> Vec<&str> {
    raw.split(QUOTE)
        .filter(|fragment| !fragment.is_empty() && *fragment != SEPARATOR)
        .collect()
}

/// Pull `<n>` out of a `Location <n>` fragment.
fn extract_location(fragment: &str, raw: &str) -> Result<String, ClippingsError> {
    let mut tokens = fragment.split_whitespace();

    let marker = tokens
        .next()
        .ok_or_else(|| ClippingsError::record("empty location fragment", raw))?;

    if !marker.eq_ignore_ascii_case(LOCATION_MARKER) {
        return Err(ClippingsError::record(
            format!("expected `Location` marker, found `{marker}`"),
            raw,
        ));
    }

    tokens
        .next()
        .map(str::to_string)
        .ok_or_else(|| ClippingsError::record("location marker without a value", raw))
}

/// Parse one highlight block into its location and title-cased text.
///
/// Fails with [`ClippingsError::MalformedRecord`] naming the raw block when
/// the location or text fragment is missing, or the location fragment does
/// not read `Location <n>`.
pub fn parse_highlight(raw: &str) -> Result<Highlight, ClippingsError> {
    let fragments = payload_fragments(raw);

    // The first fragment is the annotation metadata, which we ignore
    let payload = fragments.get(1..).unwrap_or_default();
    if payload.len() < 2 {
        return Err(ClippingsError::record(
            format!(
                "expected a location and a text fragment, found {} fragment(s)",
                payload.len()
            ),
            raw,
        ));
    }

    let location = extract_location(payload[0], raw)?;
    let text = title_case(payload[1]);

    log::trace!("parsed highlight at location {}", location);

    Ok(Highlight { location, text })
}
