//! Pipeline configuration.
//!
//! Built once at process start and passed by reference into every component.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reelgen_models::EncodingConfig;

use crate::error::{PipelineError, PipelineResult};

/// Stock-footage library settings.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Base URL; search and download paths are resolved against it
    pub base_url: String,
    /// Browser cookie export (JSON array of `{name, value}`)
    pub cookies_path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.storyblocks.com".to_string(),
            cookies_path: PathBuf::from("./cookies.json"),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for input `.txt` documents
    pub source_dir: PathBuf,
    /// Parent of the per-document working directories
    pub process_dir: PathBuf,
    /// Where final videos are written
    pub output_dir: PathBuf,
    /// Chance in percent (0-100) of routing a segment to the video platform
    pub fallback_probability: i64,
    /// Chat-completions API key
    pub openai_api_key: Option<String>,
    /// Chat-completions model
    pub openai_model: String,
    /// Chat-completions base URL
    pub openai_base_url: String,
    /// System prompt used for narration generation
    pub prompt_path: PathBuf,
    /// Stock-footage library settings
    pub library: LibraryConfig,
    /// External text-to-speech command; the output path is appended as last argument
    pub voice_command: Option<String>,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Fixed seed for the random source (reproducible runs)
    pub seed: Option<u64>,
    /// Clip and final encoding
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("./source"),
            process_dir: PathBuf::from("./process"),
            output_dir: PathBuf::from("./output"),
            fallback_probability: 30,
            openai_api_key: None,
            openai_model: "gpt-4".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            prompt_path: PathBuf::from("./prompts/prompt.txt"),
            library: LibraryConfig::default(),
            voice_command: None,
            request_timeout: Duration::from_secs(120),
            seed: None,
            encoding: EncodingConfig::default(),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path_or = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        Self {
            source_dir: path_or("REELGEN_SOURCE_DIR", defaults.source_dir),
            process_dir: path_or("REELGEN_PROCESS_DIR", defaults.process_dir),
            output_dir: path_or("REELGEN_OUTPUT_DIR", defaults.output_dir),
            fallback_probability: parse_or(
                lookup("REELGEN_YT_PROBABILITY"),
                defaults.fallback_probability,
            ),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            openai_model: lookup("REELGEN_OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: lookup("REELGEN_OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            prompt_path: path_or("REELGEN_PROMPT_PATH", defaults.prompt_path),
            library: LibraryConfig {
                base_url: lookup("REELGEN_LIBRARY_BASE_URL").unwrap_or(defaults.library.base_url),
                cookies_path: path_or("REELGEN_LIBRARY_COOKIES", defaults.library.cookies_path),
            },
            voice_command: lookup("REELGEN_TTS_COMMAND").filter(|c| !c.trim().is_empty()),
            request_timeout: Duration::from_secs(parse_or(lookup("REELGEN_REQUEST_TIMEOUT"), 120)),
            seed: lookup("REELGEN_SEED").and_then(|s| s.trim().parse().ok()),
            encoding: defaults.encoding,
        }
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(0..=100).contains(&self.fallback_probability) {
            return Err(PipelineError::config_error(format!(
                "REELGEN_YT_PROBABILITY must be within 0..=100, got {}",
                self.fallback_probability
            )));
        }
        if self.library.base_url.trim().is_empty() {
            return Err(PipelineError::config_error("library base URL is empty"));
        }
        Ok(())
    }
}
