//! The media toolkit seam.
//!
//! The pipeline only needs five media primitives. Putting them behind a
//! trait lets the acquirers and the assembler run against a fake in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelgen_models::EncodingConfig;

use crate::error::MediaResult;

/// Decode, cut, join and mux primitives.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Duration in seconds of an audio or video file.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Encode `length` seconds of `input` starting at `start` into `output`.
    async fn extract_window(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        length: f64,
    ) -> MediaResult<()>;

    /// Re-encode `input` to the common output format, cut to `duration` if given.
    async fn normalize_clip(
        &self,
        input: &Path,
        output: &Path,
        duration: Option<f64>,
    ) -> MediaResult<()>;

    /// Join normalised clips in order.
    async fn concat(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()>;

    /// Put `audio` under `video` and write the final container, `duration` seconds long.
    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        duration: f64,
    ) -> MediaResult<()>;
}

/// [`MediaToolkit`] backed by the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    encoding: EncodingConfig,
}

impl FfmpegToolkit {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self { encoding }
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        crate::probe::probe_duration(path).await
    }

    async fn extract_window(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        length: f64,
    ) -> MediaResult<()> {
        crate::clip::extract_window(input, output, start, length, &self.encoding).await
    }

    async fn normalize_clip(
        &self,
        input: &Path,
        output: &Path,
        duration: Option<f64>,
    ) -> MediaResult<()> {
        crate::clip::normalize_clip(input, output, duration, &self.encoding).await
    }

    async fn concat(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()> {
        crate::clip::concat_clips(clips, output).await
    }

    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        duration: f64,
    ) -> MediaResult<()> {
        crate::clip::mux_audio(video, audio, output, duration, &self.encoding).await
    }
}
