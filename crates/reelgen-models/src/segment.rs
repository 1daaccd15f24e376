//! Narration segments.

use serde::{Deserialize, Serialize};

/// The four block labels a narration document may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Title,
    Narration,
    Query,
    Description,
}

impl SegmentKind {
    /// All kinds, in the order their labels are tried.
    pub const ALL: [SegmentKind; 4] = [
        SegmentKind::Title,
        SegmentKind::Narration,
        SegmentKind::Query,
        SegmentKind::Description,
    ];

    /// Label that opens a block of this kind.
    pub fn label(&self) -> &'static str {
        match self {
            SegmentKind::Title => "TITLE:",
            SegmentKind::Narration => "TEXT:",
            SegmentKind::Query => "QUERY:",
            SegmentKind::Description => "DESCRIPTION:",
        }
    }

    /// Classify a trimmed block by its label prefix.
    pub fn from_block(block: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| block.starts_with(kind.label()))
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SegmentKind::Title => "title",
            SegmentKind::Narration => "narration",
            SegmentKind::Query => "query",
            SegmentKind::Description => "description",
        };
        write!(f, "{}", s)
    }
}

/// One classified unit of narration-derived text.
///
/// Only narration carries a duration weight: its share of the total
/// narration length, used to split the voice-over between segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Title { text: String },
    Narration { text: String, weight: f64 },
    Query { text: String },
    Description { text: String },
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Title { .. } => SegmentKind::Title,
            Segment::Narration { .. } => SegmentKind::Narration,
            Segment::Query { .. } => SegmentKind::Query,
            Segment::Description { .. } => SegmentKind::Description,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Segment::Title { text }
            | Segment::Narration { text, .. }
            | Segment::Query { text }
            | Segment::Description { text } => text,
        }
    }

    /// Duration weight, `Some` only for narration.
    pub fn weight(&self) -> Option<f64> {
        match self {
            Segment::Narration { weight, .. } => Some(*weight),
            _ => None,
        }
    }

    pub fn is_narration(&self) -> bool {
        matches!(self, Segment::Narration { .. })
    }
}
