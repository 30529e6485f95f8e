//! Numeric range-set matching
//!
//! One parser serves two callers: the RANGE keyword checking a value
//! against a range spec, and count-mode assertions checking how many
//! values matched.

use tracing::error;

use crate::split::split_quote_aware;

/// True when `actual` falls inside any term of the comma-separated `spec`.
///
/// Terms: `N+` accepts anything at or above N, `N-` anything at or below
/// N, `A-B` the closed interval, and a bare `N` exactly N. A term that
/// fails to parse logs an error and fails the whole call.
pub fn value_in_range(spec: &str, actual: f64) -> bool {
    let mut ranges = Vec::new();
    for term in split_quote_aware(spec, ',', true) {
        let Some(range) = parse_term(&term) else {
            error!("Failed to parse range term \"{term}\" in spec: {spec}");
            return false;
        };
        ranges.push(range);
    }

    ranges
        .iter()
        .any(|(min, max)| actual >= *min && actual <= *max)
}

fn parse_term(term: &str) -> Option<(f64, f64)> {
    if let Some(base) = term.strip_suffix('+') {
        let min: f64 = base.parse().ok()?;
        Some((min, f64::MAX))
    } else if let Some(base) = term.strip_suffix('-') {
        let max: f64 = base.parse().ok()?;
        Some((f64::MIN, max))
    } else if term.contains('-') {
        let parts = split_quote_aware(term, '-', true);
        let min: f64 = parts.first()?.parse().ok()?;
        let max: f64 = parts.get(1)?.parse().ok()?;
        Some((min, max))
    } else {
        let exact: f64 = term.parse().ok()?;
        Some((exact, exact))
    }
}
