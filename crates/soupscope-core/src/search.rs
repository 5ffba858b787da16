//! # Search
//!
//! Substring search over the instruction view of a soup.
//!
//! A tape's projection keeps each instruction byte and replaces every data
//! byte with [`PLACEHOLDER`]. Searching returns every matching tape in
//! ascending order; truncating the list for display is left to the caller.

use crate::backend::ScanBackend;
use crate::primitives::PLACEHOLDER;
use crate::store::Soup;
use crate::{TapeIndex, Token};
use serde::{Deserialize, Serialize};

/// A tape whose projection contains the searched pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub tape: TapeIndex,
    pub projection: String,
}

/// Projection as raw bytes, one per cell.
#[must_use]
pub fn project_bytes(tape: &[Token]) -> Vec<u8> {
    tape.iter()
        .map(|t| if t.is_op() { t.ch() } else { PLACEHOLDER as u8 })
        .collect()
}

/// Projection as a printable string.
#[must_use]
pub fn project(tape: &[Token]) -> String {
    tape.iter()
        .map(|t| if t.is_op() { t.ch() as char } else { PLACEHOLDER })
        .collect()
}

/// All tapes whose projection contains `pattern`, ascending by index.
///
/// An empty pattern matches every tape. A pattern containing bytes that
/// never appear in a projection matches nothing.
#[must_use]
pub fn find_matching(backend: &dyn ScanBackend, soup: &Soup, pattern: &str) -> Vec<SearchMatch> {
    backend
        .matching_tapes(soup, pattern.as_bytes())
        .into_iter()
        .filter_map(|tape| {
            soup.tape(tape).map(|cells| SearchMatch {
                tape,
                projection: project(cells),
            })
        })
        .collect()
}
