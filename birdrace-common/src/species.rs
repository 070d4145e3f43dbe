//! Species classification
//!
//! Decides whether an eBird common name counts toward the competition.
//! Domestic forms, hybrids, crosses, slash complexes and "sp." entries
//! are not full species and never count.
//!
//! This is the only place the rule lives. Observations store the result in
//! their `countable` column at insert time and every aggregate filters on
//! that column.

/// Substrings that disqualify a common name
const NON_COUNTABLE_MARKERS: &[&str] = &[
    "(Domestic", // Mallard (Domestic type)
    "hybrid",    // Mallard x American Black Duck (hybrid)
    " x ",       // Blue-winged x Golden-winged Warbler
    "/",         // Greater/Lesser Yellowlegs
    "sp.",       // gull sp.
];

/// Returns true if the common name identifies a countable species.
///
/// Blank names never count.
///
/// # Examples
///
/// ```
/// use birdrace_common::species::is_countable;
///
/// assert!(is_countable("Northern Cardinal"));
/// assert!(!is_countable("Mallard (Domestic type)"));
/// assert!(!is_countable("Greater/Lesser Yellowlegs"));
/// ```
pub fn is_countable(common_name: &str) -> bool {
    if common_name.trim().is_empty() {
        return false;
    }

    !NON_COUNTABLE_MARKERS
        .iter()
        .any(|marker| common_name.contains(marker))
}
