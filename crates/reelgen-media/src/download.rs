//! Video-platform search and download using yt-dlp.
//!
//! The platform is treated as a capability: ranked search results, a
//! per-entry list of stream formats, and a download of one chosen format.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// Default number of entries per search page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEntry {
    pub id: String,
    pub title: String,
    /// Watch URL of the entry
    pub url: String,
    pub duration: Option<f64>,
}

/// Search line as printed by `--dump-json`.
#[derive(Debug, Deserialize)]
struct RawEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl RawEntry {
    fn into_entry(self) -> Option<PlatformEntry> {
        let url = self.webpage_url.or(self.url)?;
        Some(PlatformEntry {
            id: self.id,
            title: self.title.unwrap_or_default(),
            url,
            duration: self.duration,
        })
    }
}

/// One downloadable stream of an entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    /// Total bitrate in kbit/s
    #[serde(default)]
    pub tbr: Option<f64>,
}

impl StreamFormat {
    /// Video-only stream, as served for adaptive playback.
    pub fn is_adaptive_video(&self) -> bool {
        let has_video = self.vcodec.as_deref().is_some_and(|c| c != "none");
        let has_audio = self.acodec.as_deref().is_some_and(|c| c != "none");
        has_video && !has_audio
    }
}

#[derive(Debug, Deserialize)]
struct EntryInfo {
    #[serde(default)]
    formats: Vec<StreamFormat>,
}

/// Pick the highest-bitrate adaptive video stream of the requested height and container.
pub fn select_best_stream(
    formats: &[StreamFormat],
    height: u32,
    container: &str,
) -> Option<StreamFormat> {
    formats
        .iter()
        .filter(|f| f.is_adaptive_video() && f.height == Some(height) && f.ext == container)
        .max_by(|a, b| {
            a.tbr
                .unwrap_or(0.0)
                .partial_cmp(&b.tbr.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
}

/// Parse `--dump-json` output: one JSON object per line.
pub fn parse_search_output(stdout: &str) -> Vec<PlatformEntry> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<RawEntry>(line) {
            Ok(raw) => raw.into_entry(),
            Err(e) => {
                debug!("Skipping unparseable search line: {}", e);
                None
            }
        })
        .collect()
}

/// yt-dlp backed platform client.
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    page_size: usize,
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl YtDlpClient {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    async fn run(&self, args: &[String]) -> MediaResult<String> {
        check_ytdlp()?;

        debug!("Running yt-dlp {}", args.join(" "));
        let output = Command::new("yt-dlp")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            let last = stderr.lines().last().unwrap_or("Unknown error").to_string();
            return Err(MediaError::tool_failed("yt-dlp", last, None));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// One page (0-based) of ranked search results for `query`.
    pub async fn search(&self, query: &str, page: usize) -> MediaResult<Vec<PlatformEntry>> {
        let start = page * self.page_size + 1;
        let end = (page + 1) * self.page_size;
        let args = vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            "--playlist-start".to_string(),
            start.to_string(),
            "--playlist-end".to_string(),
            end.to_string(),
            format!("ytsearch{}:{}", end, query),
        ];

        let stdout = self
            .run(&args)
            .await
            .map_err(|e| MediaError::Search(e.to_string()))?;
        let entries = parse_search_output(&stdout);
        info!(query = query, page = page, results = entries.len(), "Platform search");
        Ok(entries)
    }

    /// All stream formats offered for an entry.
    pub async fn formats(&self, entry: &PlatformEntry) -> MediaResult<Vec<StreamFormat>> {
        let args = vec![
            "-J".to_string(),
            "--no-playlist".to_string(),
            entry.url.clone(),
        ];
        let stdout = self.run(&args).await?;
        let info: EntryInfo = serde_json::from_str(&stdout)?;
        Ok(info.formats)
    }

    /// Download `format` of `entry` into `folder`, returning the file path.
    pub async fn download(
        &self,
        entry: &PlatformEntry,
        format: &StreamFormat,
        folder: impl AsRef<Path>,
    ) -> MediaResult<PathBuf> {
        let folder = folder.as_ref();
        tokio::fs::create_dir_all(folder).await?;

        let ext = if format.ext.is_empty() { "mp4" } else { &format.ext };
        let output_path = folder.join(format!("yt_{}.{}", entry.id, ext));

        info!(
            url = %entry.url,
            format = %format.format_id,
            output = %output_path.display(),
            "Downloading platform video"
        );

        let args = vec![
            "-f".to_string(),
            format.format_id.clone(),
            "--no-playlist".to_string(),
            "-o".to_string(),
            output_path.to_string_lossy().to_string(),
            entry.url.clone(),
        ];
        self.run(&args).await?;

        if !output_path.exists() {
            warn!(output = %output_path.display(), "yt-dlp reported success but no file was written");
            return Err(MediaError::Download("no output file written".to_string()));
        }

        Ok(output_path)
    }
}
