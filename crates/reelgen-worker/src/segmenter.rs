//! Narration parsing.
//!
//! Raw narration arrives as delimiter-separated blocks, each opened by a
//! `TITLE:`, `TEXT:`, `QUERY:` or `DESCRIPTION:` label. Blocks with any other
//! label are dropped.

use reelgen_models::{Segment, SegmentKind};
use tracing::debug;

use crate::error::ParseError;

/// Block delimiter used by the narration prompt.
pub const DEFAULT_DELIMITER: &str = "###";

/// Parse narration using the default `###` delimiter.
pub fn parse_narration(raw: &str) -> Result<Vec<Segment>, ParseError> {
    parse_narration_with(raw, DEFAULT_DELIMITER)
}

/// Parse narration into ordered segments and assign narration weights.
///
/// Each narration weight is its character count over the total character
/// count of all narration blocks, so the weights sum to one.
pub fn parse_narration_with(raw: &str, delimiter: &str) -> Result<Vec<Segment>, ParseError> {
    let classified: Vec<(SegmentKind, String)> = raw
        .split(delimiter)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter_map(|block| match SegmentKind::from_block(block) {
            Some(kind) => Some((kind, strip_label(block, kind))),
            None => {
                debug!(block = block, "Dropping block with unknown label");
                None
            }
        })
        .collect();

    let total: usize = classified
        .iter()
        .filter(|(kind, _)| *kind == SegmentKind::Narration)
        .map(|(_, text)| text.chars().count())
        .sum();

    if total == 0 {
        return Err(ParseError::NoNarrationSegments);
    }

    let segments = classified
        .into_iter()
        .map(|(kind, text)| match kind {
            SegmentKind::Title => Segment::Title { text },
            SegmentKind::Narration => {
                let weight = text.chars().count() as f64 / total as f64;
                Segment::Narration { text, weight }
            }
            SegmentKind::Query => Segment::Query { text },
            SegmentKind::Description => Segment::Description { text },
        })
        .collect();

    Ok(segments)
}

fn strip_label(block: &str, kind: SegmentKind) -> String {
    block[kind.label().len()..].trim().to_string()
}

/// Narration texts joined by a single space, as read by the voice-over.
pub fn narration_script(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter(|s| s.is_narration())
        .map(Segment::text)
        .collect::<Vec<_>>()
        .join(" ")
}
