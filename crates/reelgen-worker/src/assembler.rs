//! Final timeline assembly.
//!
//! Budgets are derived again from the voice-over and the narration weights,
//! each segment's clips are laid out in sequence order and the last one is
//! cut to the remaining budget. Segments with too little footage run short.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use reelgen_media::MediaToolkit;
use reelgen_models::{ClipFile, ClipKey, Segment, TimeBudget};

use crate::allocator::allocate;
use crate::error::{PipelineError, PipelineResult};

/// Remainders shorter than this are not worth a clip.
const MIN_PIECE_SECONDS: f64 = 0.01;

/// One clip as it appears on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPiece {
    pub key: ClipKey,
    pub source: PathBuf,
    /// Seconds of the clip used, from its start
    pub seconds: f64,
    /// Whether the clip is cut short of its full length
    pub trimmed: bool,
}

/// The timeline of one narration segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub budget: TimeBudget,
    pub pieces: Vec<PlannedPiece>,
}

impl SegmentPlan {
    /// Seconds actually covered by footage.
    pub fn achieved_seconds(&self) -> f64 {
        self.pieces.iter().map(|p| p.seconds).sum()
    }
}

/// Lay out `clips` against `budget`, in sequence order, cutting the clip
/// that crosses the budget and dropping the rest.
pub fn plan_segment(budget: TimeBudget, clips: &[ClipFile]) -> SegmentPlan {
    let mut ordered: Vec<&ClipFile> = clips
        .iter()
        .filter(|c| c.segment_index() == budget.segment_index)
        .collect();
    ordered.sort_by_key(|c| c.key);

    let mut pieces = Vec::new();
    let mut remaining = budget.seconds;
    for clip in ordered {
        if remaining < MIN_PIECE_SECONDS {
            break;
        }
        let trimmed = clip.duration_seconds > remaining;
        let seconds = if trimmed { remaining } else { clip.duration_seconds };
        pieces.push(PlannedPiece {
            key: clip.key,
            source: clip.path.clone(),
            seconds,
            trimmed,
        });
        remaining -= seconds;
    }

    SegmentPlan { budget, pieces }
}

/// Plan every budgeted segment, in narration order.
pub fn plan_timeline(budgets: &[TimeBudget], clips: &[ClipFile]) -> Vec<SegmentPlan> {
    let known = |index: usize| budgets.iter().any(|b| b.segment_index == index);
    for clip in clips.iter().filter(|c| !known(c.segment_index())) {
        warn!(clip = %clip.key, "Clip has no matching narration segment, ignored");
    }

    budgets.iter().map(|b| plan_segment(*b, clips)).collect()
}

/// Per-segment outcome of an assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment_index: usize,
    pub budget_seconds: f64,
    pub achieved_seconds: f64,
    pub clips_used: usize,
}

/// What was written.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub voice_seconds: f64,
    /// Length of the visual timeline; the final file is cut to this
    pub timeline_seconds: f64,
    pub segments: Vec<SegmentSummary>,
}

/// Renders the final video through a [`MediaToolkit`].
pub struct Assembler {
    toolkit: Arc<dyn MediaToolkit>,
}

impl Assembler {
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }

    /// Assemble `clips` under `voice_over` into `output`.
    pub async fn assemble(
        &self,
        segments: &[Segment],
        clips: &[ClipFile],
        voice_over: &Path,
        output: &Path,
    ) -> PipelineResult<AssemblyReport> {
        let voice_seconds = self.toolkit.probe_duration(voice_over).await?;
        let budgets = allocate(segments, voice_seconds);
        let plans = plan_timeline(&budgets, clips);

        let summaries: Vec<SegmentSummary> = plans
            .iter()
            .map(|plan| SegmentSummary {
                segment_index: plan.budget.segment_index,
                budget_seconds: plan.budget.seconds,
                achieved_seconds: plan.achieved_seconds(),
                clips_used: plan.pieces.len(),
            })
            .collect();
        let short = summaries
            .iter()
            .filter(|s| s.budget_seconds - s.achieved_seconds >= MIN_PIECE_SECONDS);
        for summary in short {
            warn!(
                segment = summary.segment_index,
                budget_secs = summary.budget_seconds,
                achieved_secs = summary.achieved_seconds,
                "Segment runs short of its budget"
            );
        }

        let pieces: Vec<&PlannedPiece> = plans.iter().flat_map(|p| p.pieces.iter()).collect();
        if pieces.is_empty() {
            return Err(PipelineError::encode_failed("no clips to assemble"));
        }
        let timeline_seconds: f64 = pieces.iter().map(|p| p.seconds).sum();

        let work_dir = tempfile::Builder::new().prefix("reelgen-assembly").tempdir()?;

        let mut normalized = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            let target = work_dir.path().join(format!("piece_{}.mp4", piece.key));
            let cut = piece.trimmed.then_some(piece.seconds);
            debug!(clip = %piece.key, seconds = piece.seconds, trimmed = piece.trimmed, "Normalizing clip");
            self.toolkit.normalize_clip(&piece.source, &target, cut).await?;
            normalized.push(target);
        }

        let timeline = work_dir.path().join("timeline.mp4");
        self.toolkit.concat(&normalized, &timeline).await?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.toolkit
            .mux_audio(&timeline, voice_over, output, timeline_seconds)
            .await?;

        info!(
            output = %output.display(),
            voice_secs = voice_seconds,
            timeline_secs = timeline_seconds,
            clips = pieces.len(),
            "Video assembled"
        );

        Ok(AssemblyReport {
            output: output.to_path_buf(),
            voice_seconds,
            timeline_seconds,
            segments: summaries,
        })
    }
}
