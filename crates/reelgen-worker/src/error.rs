//! Pipeline error types.

use thiserror::Error;

use reelgen_media::MediaError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Narration text that cannot be budgeted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("narration contains no TEXT: segments")]
    NoNarrationSegments,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{origin} source unavailable{suffix}", suffix = status_suffix(.status))]
    SourceUnavailable { origin: String, status: Option<u16> },

    #[error("No candidates found for query: {0}")]
    NoCandidatesFound(String),

    #[error("Sampling exhausted: no {clips} non-overlapping {window_secs}s windows found in {clip_secs:.1}s")]
    SamplingExhausted {
        clips: usize,
        window_secs: f64,
        clip_secs: f64,
    },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Search(message) => {
                tracing::debug!("platform search failed: {}", message);
                PipelineError::SourceUnavailable {
                    origin: "fallback".to_string(),
                    status: None,
                }
            }
            MediaError::Io(e) => PipelineError::Io(e),
            e if e.is_encode_failure() => PipelineError::EncodeFailed(e.to_string()),
            e => PipelineError::DownloadFailed(e.to_string()),
        }
    }
}

impl PipelineError {
    pub fn source_unavailable(origin: impl Into<String>, status: Option<u16>) -> Self {
        Self::SourceUnavailable {
            origin: origin.into(),
            status,
        }
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Conditions absorbed at the segment boundary: the segment ends up with
    /// fewer or no clips, siblings are unaffected.
    pub fn is_segment_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceUnavailable { .. }
                | PipelineError::NoCandidatesFound(_)
                | PipelineError::SamplingExhausted { .. }
        )
    }
}
