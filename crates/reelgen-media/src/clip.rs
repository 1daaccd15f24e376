//! Clip operations: window extraction, normalisation, concatenation, muxing.
//!
//! Every clip that reaches the final concat has been through
//! [`normalize_clip`], so the concat demuxer can stream-copy them.

use std::path::{Path, PathBuf};
use tracing::info;

use reelgen_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Upper bound on a single ffmpeg run.
pub const FFMPEG_TIMEOUT_SECS: u64 = 1800;

fn runner() -> FfmpegRunner {
    FfmpegRunner::new().with_timeout(FFMPEG_TIMEOUT_SECS)
}

/// Extract `length` seconds starting at `start_secs` and encode them to `output`.
pub async fn extract_window(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start_secs: f64,
    length: f64,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if length <= 0.0 {
        return Err(MediaError::InvalidArgument(format!(
            "window length must be positive, got {}",
            length
        )));
    }

    info!(
        "Extracting window: {} -> {} (start: {:.2}s, length: {:.2}s)",
        input.display(),
        output.display(),
        start_secs,
        length
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(start_secs)
        .duration(length)
        .output_args(encoding.to_ffmpeg_args());

    runner().run(&cmd).await
}

/// Re-encode a clip to the common frame size and rate, optionally cut to
/// its first `duration` seconds. Audio is dropped.
pub async fn normalize_clip(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    duration: Option<f64>,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let mut cmd = FfmpegCommand::new(input.as_ref(), output.as_ref());
    if let Some(secs) = duration {
        cmd = cmd.duration(secs);
    }
    let cmd = cmd
        .video_filter(encoding.normalize_filter())
        .output_args(encoding.video_args())
        .no_audio();

    runner().run(&cmd).await
}

/// Quote a path for an ffmpeg concat list entry.
fn concat_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Build the concat demuxer list for `clips`, in order.
pub fn concat_list(clips: &[PathBuf]) -> String {
    let mut list = clips
        .iter()
        .map(|p| concat_entry(p))
        .collect::<Vec<_>>()
        .join("\n");
    list.push('\n');
    list
}

/// Concatenate already-normalised clips into `output` without re-encoding.
pub async fn concat_clips(clips: &[PathBuf], output: impl AsRef<Path>) -> MediaResult<()> {
    let output = output.as_ref();

    if clips.is_empty() {
        return Err(MediaError::InvalidArgument(
            "cannot concatenate an empty clip list".to_string(),
        ));
    }

    let list_dir = tempfile::tempdir()?;
    let list_path = list_dir.path().join("concat.txt");
    tokio::fs::write(&list_path, concat_list(clips)).await?;

    info!(clips = clips.len(), output = %output.display(), "Concatenating clips");

    let cmd = FfmpegCommand::new(&list_path, output)
        .input_format("concat")
        .input_arg("-safe")
        .input_arg("0")
        .codec_copy();

    runner().run(&cmd).await
}

/// Lay `audio` under the video track of `video`, cut to `duration` seconds,
/// and encode the final container.
pub async fn mux_audio(
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
    duration: f64,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let output = output.as_ref();

    info!(
        output = %output.display(),
        duration_secs = duration,
        "Muxing voice-over into final video"
    );

    let cmd = FfmpegCommand::new(video.as_ref(), output)
        .add_input(audio.as_ref())
        .map("0:v:0")
        .map("1:a:0")
        .output_args(encoding.to_ffmpeg_args())
        .output_duration(duration);

    runner().run(&cmd).await
}
