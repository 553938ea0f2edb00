//! Location-keyed note merging.

use crate::clippings::Highlight;
use std::collections::HashSet;

/// Select the highlights whose location is not already known.
///
/// Relative order is preserved. A location repeated inside `parsed` is
/// only taken once (the first occurrence), so the result never introduces
/// two notes at the same location.
pub fn merge_new_notes<'a>(
    existing_locations: &HashSet<&str>,
    parsed: &'a [Highlight],
) -> Vec<&'a Highlight> {
    let mut taken: HashSet<&str> = HashSet::new();

    parsed
        .iter()
        .filter(|highlight| {
            let location = highlight.location.as_str();
            !existing_locations.contains(location) && taken.insert(location)
        })
        .collect()
}
