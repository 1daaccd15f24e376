//! Per-segment source routing.

use std::path::Path;

use rand::Rng;
use tracing::{info, warn};

use reelgen_models::{ClipFile, SourceDecision, TimeBudget};

use crate::error::{PipelineError, PipelineResult};
use crate::fallback::FallbackAcquirer;
use crate::library::LibraryAcquirer;

/// Chooses the footage source for each segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRouter {
    fallback_probability: i64,
}

impl SourceRouter {
    /// `fallback_probability` is a percentage in `0..=100`.
    pub fn new(fallback_probability: i64) -> PipelineResult<Self> {
        if !(0..=100).contains(&fallback_probability) {
            return Err(PipelineError::config_error(format!(
                "fallback probability must be within 0..=100, got {}",
                fallback_probability
            )));
        }
        Ok(Self {
            fallback_probability,
        })
    }

    pub fn fallback_probability(&self) -> i64 {
        self.fallback_probability
    }

    /// Draw an integer in `0..=100`; at or below the probability goes to the fallback.
    ///
    /// The bound is inclusive, so the effective fallback rate is `(p + 1) / 101`.
    pub fn decide<R: Rng + ?Sized>(&self, rng: &mut R) -> SourceDecision {
        let draw: i64 = rng.random_range(0..=100);
        if draw <= self.fallback_probability {
            SourceDecision::Fallback
        } else {
            SourceDecision::Library
        }
    }
}

/// Routes a segment and applies the library-to-fallback recovery rules.
pub struct SegmentAcquirer {
    router: SourceRouter,
    library: LibraryAcquirer,
    fallback: FallbackAcquirer,
}

impl SegmentAcquirer {
    pub fn new(router: SourceRouter, library: LibraryAcquirer, fallback: FallbackAcquirer) -> Self {
        Self {
            router,
            library,
            fallback,
        }
    }

    /// Acquire clips for one `(query, budget)` pair.
    ///
    /// An empty or unavailable library result goes to the fallback. A
    /// recoverable fallback failure leaves the segment without clips.
    /// Download and encode failures propagate.
    pub async fn acquire_segment<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        query: &str,
        budget: TimeBudget,
        videos_dir: &Path,
    ) -> PipelineResult<Vec<ClipFile>> {
        let decision = self.router.decide(rng);
        info!(
            segment = budget.segment_index,
            query = query,
            budget_secs = budget.seconds,
            source = %decision,
            "Acquiring segment"
        );

        if decision == SourceDecision::Library {
            match self.library.acquire(rng, query, budget, videos_dir).await {
                Ok(clips) if !clips.is_empty() => return Ok(clips),
                Ok(_) => {
                    info!(segment = budget.segment_index, "Library returned nothing, using fallback");
                }
                Err(e) if e.is_segment_recoverable() => {
                    warn!(segment = budget.segment_index, "Library failed, using fallback: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        match self.fallback.acquire(rng, query, budget, videos_dir).await {
            Ok(clips) => Ok(clips),
            Err(e) if e.is_segment_recoverable() => {
                warn!(segment = budget.segment_index, "Segment skipped: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
