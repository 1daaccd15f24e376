//! Narration-to-video worker.
//!
//! This crate provides:
//! - Narration segmenting and per-segment time budgets
//! - Source routing between the stock library and the video platform
//! - Library acquisition with greedy trimming
//! - Platform acquisition with random window sampling
//! - Timeline assembly under the voice-over
//! - The per-document pipeline and its collaborators

pub mod allocator;
pub mod assembler;
pub mod config;
pub mod error;
pub mod fallback;
pub mod library;
pub mod logging;
pub mod narration;
pub mod pipeline;
pub mod router;
pub mod sampler;
pub mod segmenter;
pub mod voice;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{Assembler, AssemblyReport};
pub use config::{LibraryConfig, PipelineConfig};
pub use error::{ParseError, PipelineError, PipelineResult};
pub use logging::DocumentLogger;
pub use pipeline::{DocumentPipeline, PipelineParts};
pub use router::{SegmentAcquirer, SourceRouter};
