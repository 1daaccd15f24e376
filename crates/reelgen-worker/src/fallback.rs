//! Video-platform acquisition.
//!
//! Downloads one full-length video for the segment and cuts it into
//! fixed-length windows picked by the interval sampler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use reelgen_media::download::select_best_stream;
use reelgen_media::{MediaToolkit, PlatformEntry, StreamFormat, YtDlpClient};
use reelgen_models::{ClipFile, ClipKey, TimeBudget};

use crate::error::{PipelineError, PipelineResult};
use crate::sampler::sample_windows;

/// Length of every window cut from a platform video, in seconds.
pub const FALLBACK_CLIP_SECONDS: f64 = 7.0;

/// Stream requirements for the downloaded source video.
pub const STREAM_HEIGHT: u32 = 1080;
pub const STREAM_CONTAINER: &str = "mp4";

/// Result pages fetched per search: the first page plus one more.
const SEARCH_PAGES: usize = 2;

/// Name of the scratch directory, inside the videos directory, holding full downloads.
pub const SCRATCH_DIR_NAME: &str = "yt";

/// Ranked search, stream selection and download on a general video platform.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    /// One page (0-based) of ranked entries.
    async fn search(&self, query: &str, page: usize) -> PipelineResult<Vec<PlatformEntry>>;

    /// Best adaptive stream of the given height and container, `None` if the
    /// entry has none or cannot be played.
    async fn best_stream(
        &self,
        entry: &PlatformEntry,
        height: u32,
        container: &str,
    ) -> PipelineResult<Option<StreamFormat>>;

    /// Download `stream` into `dir`, returning the file path.
    async fn download(
        &self,
        entry: &PlatformEntry,
        stream: &StreamFormat,
        dir: &Path,
    ) -> PipelineResult<PathBuf>;
}

/// [`FallbackSource`] backed by yt-dlp.
#[derive(Debug, Clone, Default)]
pub struct YtDlpSource {
    client: YtDlpClient,
}

impl YtDlpSource {
    pub fn new(client: YtDlpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FallbackSource for YtDlpSource {
    async fn search(&self, query: &str, page: usize) -> PipelineResult<Vec<PlatformEntry>> {
        Ok(self.client.search(query, page).await?)
    }

    async fn best_stream(
        &self,
        entry: &PlatformEntry,
        height: u32,
        container: &str,
    ) -> PipelineResult<Option<StreamFormat>> {
        match self.client.formats(entry).await {
            Ok(formats) => Ok(select_best_stream(&formats, height, container)),
            Err(e) => {
                warn!(title = %entry.title, "Entry unavailable: {}", e);
                Ok(None)
            }
        }
    }

    async fn download(
        &self,
        entry: &PlatformEntry,
        stream: &StreamFormat,
        dir: &Path,
    ) -> PipelineResult<PathBuf> {
        Ok(self.client.download(entry, stream, dir).await?)
    }
}

/// Number of fixed-length windows needed to cover `budget_seconds`.
pub fn clip_count(budget_seconds: f64) -> usize {
    if budget_seconds.is_finite() && budget_seconds > 0.0 {
        (budget_seconds / FALLBACK_CLIP_SECONDS).ceil() as usize
    } else {
        0
    }
}

async fn remove_scratch(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), "Failed to remove scratch directory: {}", e);
        }
    }
}

/// Fallback side of segment acquisition.
pub struct FallbackAcquirer {
    source: Arc<dyn FallbackSource>,
    toolkit: Arc<dyn MediaToolkit>,
}

impl FallbackAcquirer {
    pub fn new(source: Arc<dyn FallbackSource>, toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { source, toolkit }
    }

    /// Acquire clips covering `budget` into `videos_dir`.
    ///
    /// Fails with `NoCandidatesFound` when nothing usable turns up and with
    /// `SamplingExhausted` when the source video cannot hold the windows.
    pub async fn acquire<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        query: &str,
        budget: TimeBudget,
        videos_dir: &Path,
    ) -> PipelineResult<Vec<ClipFile>> {
        let count = clip_count(budget.seconds);
        if count == 0 {
            debug!(segment = budget.segment_index, "Empty budget, nothing to acquire");
            return Ok(Vec::new());
        }

        let scratch = videos_dir.join(SCRATCH_DIR_NAME);
        let outcome = match self.download_first_usable(query, &scratch).await {
            Ok(source_video) => {
                self.cut_windows(rng, &source_video, budget.segment_index, count, videos_dir)
                    .await
            }
            Err(e) => Err(e),
        };
        remove_scratch(&scratch).await;
        outcome
    }

    async fn download_first_usable(&self, query: &str, scratch: &Path) -> PipelineResult<PathBuf> {
        let mut entries = self.source.search(query, 0).await?;
        if entries.is_empty() {
            return Err(PipelineError::NoCandidatesFound(query.to_string()));
        }

        for page in 1..SEARCH_PAGES {
            match self.source.search(query, page).await {
                Ok(more) => entries.extend(more),
                Err(e) => warn!(query = query, page = page, "Extra result page unavailable: {}", e),
            }
        }

        for entry in &entries {
            let Some(stream) = self
                .source
                .best_stream(entry, STREAM_HEIGHT, STREAM_CONTAINER)
                .await?
            else {
                debug!(title = %entry.title, "No usable stream, skipping");
                continue;
            };

            tokio::fs::create_dir_all(scratch).await?;
            info!(title = %entry.title, format = %stream.format_id, "Downloading platform source video");
            return self.source.download(entry, &stream, scratch).await;
        }

        Err(PipelineError::NoCandidatesFound(query.to_string()))
    }

    async fn cut_windows<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        source_video: &Path,
        segment_index: usize,
        count: usize,
        videos_dir: &Path,
    ) -> PipelineResult<Vec<ClipFile>> {
        let duration = self.toolkit.probe_duration(source_video).await?;
        let starts = sample_windows(rng, duration, count, FALLBACK_CLIP_SECONDS);
        if starts.is_empty() {
            return Err(PipelineError::SamplingExhausted {
                clips: count,
                window_secs: FALLBACK_CLIP_SECONDS,
                clip_secs: duration,
            });
        }

        let mut clips = Vec::with_capacity(starts.len());
        for (sequence, start) in starts.into_iter().enumerate() {
            let key = ClipKey::new(segment_index, sequence);
            let path = key.path_in(videos_dir);
            self.toolkit
                .extract_window(source_video, &path, start, FALLBACK_CLIP_SECONDS)
                .await?;
            info!(clip = %key, start = start, "Extracted platform window");
            clips.push(ClipFile::new(key, path, FALLBACK_CLIP_SECONDS));
        }

        Ok(clips)
    }
}
