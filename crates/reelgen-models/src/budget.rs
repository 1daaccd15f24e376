//! Per-segment time budgets and source routing decisions.

use serde::{Deserialize, Serialize};

/// Screen time allocated to one narration segment.
///
/// Derived from the segment weight and the voice-over duration; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBudget {
    /// Index of the narration segment (0-based, narration order)
    pub segment_index: usize,
    /// Allocated seconds
    pub seconds: f64,
}

impl TimeBudget {
    pub fn new(segment_index: usize, seconds: f64) -> Self {
        Self {
            segment_index,
            seconds,
        }
    }
}

/// Which footage source a segment is acquired from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDecision {
    /// Curated stock-footage library
    Library,
    /// General video platform
    Fallback,
}

impl std::fmt::Display for SourceDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceDecision::Library => write!(f, "library"),
            SourceDecision::Fallback => write!(f, "fallback"),
        }
    }
}
