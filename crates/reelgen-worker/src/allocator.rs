//! Per-segment time budgets.

use reelgen_models::{Segment, TimeBudget};
use tracing::warn;

/// Split `total_seconds` of voice-over between the narration segments.
///
/// Budgets come out in narration order; `segment_index` counts narration
/// segments only.
pub fn allocate(segments: &[Segment], total_seconds: f64) -> Vec<TimeBudget> {
    segments
        .iter()
        .filter_map(Segment::weight)
        .enumerate()
        .map(|(index, weight)| TimeBudget::new(index, weight * total_seconds))
        .collect()
}

/// Pair the i-th query with the i-th narration budget.
///
/// Extra queries or budgets are dropped; a count mismatch is logged.
pub fn pair_queries<'a>(
    segments: &'a [Segment],
    budgets: &[TimeBudget],
) -> Vec<(&'a str, TimeBudget)> {
    let queries: Vec<&str> = segments
        .iter()
        .filter(|s| matches!(s, Segment::Query { .. }))
        .map(Segment::text)
        .collect();

    if queries.len() != budgets.len() {
        warn!(
            queries = queries.len(),
            narration_segments = budgets.len(),
            "Query and narration counts differ, pairing truncated to the shorter"
        );
    }

    queries.into_iter().zip(budgets.iter().copied()).collect()
}
