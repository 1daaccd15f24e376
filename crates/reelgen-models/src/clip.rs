//! Footage candidates and acquired clip files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extension of every acquired clip.
pub const CLIP_EXTENSION: &str = "mp4";

/// A search hit from a footage source, consumed immediately by download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipCandidate {
    pub title: String,
    /// Duration in whole seconds as reported by the source
    pub duration_seconds: u32,
    /// Absolute download URL
    pub source_url: String,
}

impl ClipCandidate {
    pub fn new(title: impl Into<String>, duration_seconds: u32, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            duration_seconds,
            source_url: source_url.into(),
        }
    }
}

/// Error parsing a clip file name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipNameError {
    #[error("clip name must look like <segment>_<sequence>.mp4: {0}")]
    Malformed(String),
}

/// Ordering key of a clip: segment first, then position within the segment.
///
/// The derived `Ord` compares `segment_index` before `sequence_index`, which
/// is the order the assembler consumes clips in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClipKey {
    pub segment_index: usize,
    pub sequence_index: usize,
}

impl ClipKey {
    pub fn new(segment_index: usize, sequence_index: usize) -> Self {
        Self {
            segment_index,
            sequence_index,
        }
    }

    /// File name on disk, e.g. `3_0.mp4`.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.segment_index, self.sequence_index, CLIP_EXTENSION
        )
    }

    /// Path of this clip inside a videos directory.
    pub fn path_in(&self, videos_dir: impl AsRef<Path>) -> PathBuf {
        videos_dir.as_ref().join(self.file_name())
    }

    /// Parse a key back out of a clip path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClipNameError> {
        let path = path.as_ref();
        let malformed = || ClipNameError::Malformed(path.display().to_string());

        if path.extension().and_then(|e| e.to_str()) != Some(CLIP_EXTENSION) {
            return Err(malformed());
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(malformed)?;
        let (segment, sequence) = stem.split_once('_').ok_or_else(malformed)?;

        Ok(Self {
            segment_index: segment.parse().map_err(|_| malformed())?,
            sequence_index: sequence.parse().map_err(|_| malformed())?,
        })
    }
}

impl std::fmt::Display for ClipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.segment_index, self.sequence_index)
    }
}

/// A materialised clip, the unit the assembler consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipFile {
    pub key: ClipKey,
    pub path: PathBuf,
    pub duration_seconds: f64,
}

impl ClipFile {
    pub fn new(key: ClipKey, path: impl Into<PathBuf>, duration_seconds: f64) -> Self {
        Self {
            key,
            path: path.into(),
            duration_seconds,
        }
    }

    pub fn segment_index(&self) -> usize {
        self.key.segment_index
    }

    pub fn sequence_index(&self) -> usize {
        self.key.sequence_index
    }
}
