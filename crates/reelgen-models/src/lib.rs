//! Shared data models for the reelgen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Narration segments and their duration weights
//! - Per-segment time budgets and source decisions
//! - Stock-footage candidates and acquired clip files
//! - Encoding configuration for clip and final renders

pub mod budget;
pub mod clip;
pub mod encoding;
pub mod segment;

// Re-export common types
pub use budget::{SourceDecision, TimeBudget};
pub use clip::{ClipCandidate, ClipFile, ClipKey, ClipNameError};
pub use encoding::EncodingConfig;
pub use segment::{Segment, SegmentKind};
