//! Local filter/search over already-loaded rows.
//!
//! Pure text matching with no network effect: the drilldown keeps its
//! unfiltered row superset and pagination state untouched, and observers
//! see a filtered projection. Matching is case- and diacritic-insensitive
//! over the concatenation of id, title, subtitle and status.

use unicode_normalization::UnicodeNormalization;

use crate::types::Row;

/// Fold a string for matching: NFD-decompose, drop combining marks,
/// lowercase.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_combining_mark(c: char) -> bool {
    // Combining Diacritical Marks plus the supplement/extended blocks.
    matches!(c, '\u{0300}'..='\u{036f}' | '\u{1ab0}'..='\u{1aff}' | '\u{1dc0}'..='\u{1dff}')
}

/// Whether a row matches a free-text term. An empty (or whitespace-only)
/// term matches everything.
pub fn row_matches(row: &Row, term: &str) -> bool {
    let needle = fold(term.trim());
    if needle.is_empty() {
        return true;
    }
    let haystack = fold(&format!(
        "{} {} {} {}",
        row.id,
        row.title,
        row.subtitle.as_deref().unwrap_or(""),
        row.status.as_deref().unwrap_or(""),
    ));
    haystack.contains(&needle)
}

/// Filtered projection of a row slice. Order is preserved.
pub fn filter_rows<'a>(rows: &'a [Row], term: &str) -> Vec<&'a Row> {
    rows.iter().filter(|row| row_matches(row, term)).collect()
}
