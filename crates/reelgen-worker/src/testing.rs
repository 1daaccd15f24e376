//! In-memory stand-ins for the media toolkit, footage sources and collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use reelgen_media::{MediaError, MediaResult, MediaToolkit, PlatformEntry, StreamFormat};
use reelgen_models::ClipCandidate;

use crate::error::{PipelineError, PipelineResult};
use crate::fallback::FallbackSource;
use crate::library::LibrarySource;
use crate::narration::NarrationGenerator;
use crate::voice::VoiceOverSynthesizer;

/// Every call the fake toolkit received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolkitCall {
    Probe(PathBuf),
    Extract { input: PathBuf, output: PathBuf, start: f64, length: f64 },
    Normalize { input: PathBuf, output: PathBuf, duration: Option<f64> },
    Concat { clips: Vec<PathBuf>, output: PathBuf },
    Mux { video: PathBuf, audio: PathBuf, output: PathBuf, duration: f64 },
}

/// Writes placeholder files instead of encoding and answers probes from a table.
#[derive(Default)]
pub struct FakeToolkit {
    durations: Mutex<HashMap<PathBuf, f64>>,
    default_duration: Option<f64>,
    pub calls: Mutex<Vec<ToolkitCall>>,
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe answer for any path without an explicit duration.
    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = Some(seconds);
        self
    }

    pub fn set_duration(&self, path: impl Into<PathBuf>, seconds: f64) {
        self.durations.lock().unwrap().insert(path.into(), seconds);
    }

    pub fn calls(&self) -> Vec<ToolkitCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ToolkitCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        self.record(ToolkitCall::Probe(path.to_path_buf()));
        let known = self.durations.lock().unwrap().get(path).copied();
        known
            .or(self.default_duration)
            .ok_or_else(|| MediaError::FileNotFound(path.to_path_buf()))
    }

    async fn extract_window(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        length: f64,
    ) -> MediaResult<()> {
        self.record(ToolkitCall::Extract {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            start,
            length,
        });
        std::fs::write(output, b"window")?;
        Ok(())
    }

    async fn normalize_clip(
        &self,
        input: &Path,
        output: &Path,
        duration: Option<f64>,
    ) -> MediaResult<()> {
        self.record(ToolkitCall::Normalize {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            duration,
        });
        std::fs::write(output, b"normalized")?;
        Ok(())
    }

    async fn concat(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()> {
        self.record(ToolkitCall::Concat {
            clips: clips.to_vec(),
            output: output.to_path_buf(),
        });
        std::fs::write(output, b"timeline")?;
        Ok(())
    }

    async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        duration: f64,
    ) -> MediaResult<()> {
        self.record(ToolkitCall::Mux {
            video: video.to_path_buf(),
            audio: audio.to_path_buf(),
            output: output.to_path_buf(),
            duration,
        });
        std::fs::write(output, b"final")?;
        Ok(())
    }
}

pub fn entry(id: &str) -> PlatformEntry {
    PlatformEntry {
        id: id.to_string(),
        title: format!("video {}", id),
        url: format!("https://platform.test/watch?v={}", id),
        duration: None,
    }
}

pub fn stream(id: &str) -> StreamFormat {
    StreamFormat {
        format_id: id.to_string(),
        ext: "mp4".to_string(),
        height: Some(1080),
        vcodec: Some("avc1".to_string()),
        acodec: Some("none".to_string()),
        tbr: Some(4000.0),
    }
}

/// Scripted fallback platform.
#[derive(Default)]
pub struct FakePlatform {
    /// Result pages, indexed by page number
    pub pages: Vec<Vec<PlatformEntry>>,
    /// Entry ids that offer a usable stream
    pub with_stream: Vec<String>,
    pub search_fails: bool,
    pub searches: Mutex<Vec<(String, usize)>>,
    pub downloads: Mutex<Vec<String>>,
}

#[async_trait]
impl FallbackSource for FakePlatform {
    async fn search(&self, query: &str, page: usize) -> PipelineResult<Vec<PlatformEntry>> {
        self.searches.lock().unwrap().push((query.to_string(), page));
        if self.search_fails {
            return Err(PipelineError::source_unavailable("fallback", None));
        }
        Ok(self.pages.get(page).cloned().unwrap_or_default())
    }

    async fn best_stream(
        &self,
        entry: &PlatformEntry,
        _height: u32,
        _container: &str,
    ) -> PipelineResult<Option<StreamFormat>> {
        Ok(self
            .with_stream
            .contains(&entry.id)
            .then(|| stream(&format!("f-{}", entry.id))))
    }

    async fn download(
        &self,
        entry: &PlatformEntry,
        _stream: &StreamFormat,
        dir: &Path,
    ) -> PipelineResult<PathBuf> {
        self.downloads.lock().unwrap().push(entry.id.clone());
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("yt_{}.mp4", entry.id));
        std::fs::write(&path, b"full video")?;
        Ok(path)
    }
}

/// Library answering every search with the same ranked candidates.
pub struct StaticLibrary {
    pub results: Vec<ClipCandidate>,
}

impl StaticLibrary {
    pub fn with_durations(durations: &[u32]) -> Self {
        Self {
            results: durations
                .iter()
                .enumerate()
                .map(|(i, d)| ClipCandidate::new(format!("stock {}", i), *d, format!("https://lib/{}", i)))
                .collect(),
        }
    }
}

#[async_trait]
impl LibrarySource for StaticLibrary {
    async fn search(&self, _query: &str, _requested: usize) -> PipelineResult<Vec<ClipCandidate>> {
        Ok(self.results.clone())
    }

    async fn download(&self, _candidate: &ClipCandidate, dest: &Path) -> PipelineResult<()> {
        std::fs::write(dest, b"stock clip")?;
        Ok(())
    }
}

/// Narrator returning a fixed text.
pub struct FixedNarrator(pub String);

#[async_trait]
impl NarrationGenerator for FixedNarrator {
    async fn generate(&self, _input: &str) -> PipelineResult<String> {
        Ok(self.0.clone())
    }
}

/// Voice-over that records the text it was given and writes a placeholder.
#[derive(Default)]
pub struct RecordingVoice {
    pub texts: Mutex<Vec<String>>,
}

#[async_trait]
impl VoiceOverSynthesizer for RecordingVoice {
    async fn synthesize(&self, _document: &str, text: &str, output: &Path) -> PipelineResult<()> {
        self.texts.lock().unwrap().push(text.to_string());
        std::fs::write(output, b"RIFF")?;
        Ok(())
    }
}
