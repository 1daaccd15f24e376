//! Per-document working directories and source discovery.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use reelgen_media::MediaToolkit;
use reelgen_models::{ClipFile, ClipKey, Segment};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::segmenter::narration_script;

pub const VIDEOS_DIR: &str = "videos";
pub const META_FILE: &str = "meta.txt";
pub const VIDEO_TEXT_FILE: &str = "video_text.txt";
pub const VOICEOVER_FILE: &str = "voiceover.wav";
pub const NARRATION_FILE: &str = "narration.txt";

/// Working directory of one input document: `<process_dir>/<document stem>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentWorkspace {
    name: String,
    root: PathBuf,
}

impl DocumentWorkspace {
    pub fn new(process_dir: impl AsRef<Path>, document: impl AsRef<Path>) -> Self {
        let name = document
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let root = process_dir.as_ref().join(&name);
        Self { name, root }
    }

    /// Workspace at an existing working directory.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        Self { name, root }
    }

    /// Document name (input file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join(VIDEOS_DIR)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    pub fn video_text_path(&self) -> PathBuf {
        self.root.join(VIDEO_TEXT_FILE)
    }

    pub fn voiceover_path(&self) -> PathBuf {
        self.root.join(VOICEOVER_FILE)
    }

    /// Raw generated narration, kept so the document can be reassembled.
    pub fn narration_path(&self) -> PathBuf {
        self.root.join(NARRATION_FILE)
    }

    /// Final video: `<output_dir>/<document stem>.mp4`.
    pub fn output_path(&self, output_dir: impl AsRef<Path>) -> PathBuf {
        output_dir.as_ref().join(format!("{}.mp4", self.name))
    }

    pub async fn create(&self) -> PipelineResult<()> {
        tokio::fs::create_dir_all(self.videos_dir()).await?;
        Ok(())
    }
}

/// Title and description texts joined by a blank line.
pub fn meta_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter(|s| matches!(s, Segment::Title { .. } | Segment::Description { .. }))
        .map(Segment::text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write `meta.txt` and `video_text.txt`, creating the videos directory.
pub async fn write_document_meta(
    segments: &[Segment],
    workspace: &DocumentWorkspace,
) -> PipelineResult<()> {
    workspace.create().await?;
    tokio::fs::write(workspace.meta_path(), meta_text(segments)).await?;
    tokio::fs::write(workspace.video_text_path(), narration_script(segments)).await?;
    info!(document = workspace.name(), "Document meta saved");
    Ok(())
}

/// Input documents: regular `.txt` files (any case), sorted by path.
pub async fn source_documents(dir: impl AsRef<Path>) -> PipelineResult<Vec<PathBuf>> {
    let mut documents = Vec::new();
    let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_txt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
        if is_txt && entry.file_type().await?.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

/// Wipe and recreate the process and output directories.
///
/// Removal is best-effort; creation failures propagate.
pub async fn prepare_directories(config: &PipelineConfig) -> PipelineResult<()> {
    for dir in [&config.process_dir, &config.output_dir] {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!(dir = %dir.display(), "Failed to clear directory: {}", e);
            }
        }
        tokio::fs::create_dir_all(dir).await?;
    }
    info!("Directories prepared");
    Ok(())
}

/// Rebuild clip files from `{segment}_{sequence}.mp4` names in `videos_dir`.
///
/// Other files are ignored. Durations are probed; the result is sorted by key.
pub async fn collect_clip_files(
    videos_dir: impl AsRef<Path>,
    toolkit: &dyn MediaToolkit,
) -> PipelineResult<Vec<ClipFile>> {
    let mut clips = Vec::new();
    let mut entries = tokio::fs::read_dir(videos_dir.as_ref()).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Ok(key) = ClipKey::from_path(&path) else {
            continue;
        };
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match toolkit.probe_duration(&path).await {
            Ok(duration) => clips.push(ClipFile::new(key, path, duration)),
            Err(e) => warn!(clip = %key, "Skipping unreadable clip: {}", e),
        }
    }
    clips.sort_by_key(|c| c.key);
    Ok(clips)
}
