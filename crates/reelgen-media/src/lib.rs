//! FFmpeg and yt-dlp wrappers for clip extraction and assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and execution
//! - Duration probing with FFprobe
//! - Window extraction, clip normalisation, concatenation and audio muxing
//! - Video-platform search, stream selection and download via yt-dlp
//! - The [`MediaToolkit`] trait the pipeline renders through

pub mod clip;
pub mod command;
pub mod download;
pub mod error;
pub mod probe;
pub mod toolkit;

pub use clip::{concat_clips, extract_window, mux_audio, normalize_clip};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use download::{PlatformEntry, StreamFormat, YtDlpClient};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use toolkit::{FfmpegToolkit, MediaToolkit};
