//! Failures from the external media binaries and the video platform.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// A media failure, tagged with the binary that produced it where one did.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} is not installed or not on PATH")]
    ToolMissing(&'static str),

    /// A tool ran and exited unsuccessfully.
    #[error("{tool} exited unsuccessfully: {message}")]
    ToolFailed {
        tool: &'static str,
        message: String,
        stderr: Option<String>,
    },

    #[error("{tool} still running after {secs}s, killed")]
    Timeout { tool: &'static str, secs: u64 },

    #[error("platform search failed: {0}")]
    Search(String),

    #[error("platform download failed: {0}")]
    Download(String),

    #[error("media file {0} does not exist")]
    FileNotFound(PathBuf),

    #[error("unreadable media: {0}")]
    InvalidMedia(String),

    #[error("bad media request: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed tool output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Binaries whose failures mean the media itself could not be processed.
const ENCODE_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

impl MediaError {
    pub fn tool_failed(
        tool: &'static str,
        message: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::ToolFailed {
            tool,
            message: message.into(),
            stderr,
        }
    }

    /// Encoding and decoding failures, as opposed to fetching ones.
    pub fn is_encode_failure(&self) -> bool {
        match self {
            MediaError::ToolMissing(tool)
            | MediaError::ToolFailed { tool, .. }
            | MediaError::Timeout { tool, .. } => ENCODE_TOOLS.contains(tool),
            MediaError::InvalidMedia(_) => true,
            _ => false,
        }
    }
}
