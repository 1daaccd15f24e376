//! Voice-over synthesis.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Renders narration text to an audio file.
#[async_trait]
pub trait VoiceOverSynthesizer: Send + Sync {
    /// Write the voice-over for `document` (its file stem) to `output`.
    async fn synthesize(&self, document: &str, text: &str, output: &Path) -> PipelineResult<()>;
}

/// Runs an external text-to-speech command.
///
/// The text goes to the command's stdin and the output path is appended as
/// its last argument.
#[derive(Debug, Clone)]
pub struct CommandVoiceOver {
    program: String,
    args: Vec<String>,
}

impl CommandVoiceOver {
    /// Parse a whitespace-separated command line.
    pub fn new(command_line: &str) -> PipelineResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| PipelineError::config_error("empty voice-over command"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl VoiceOverSynthesizer for CommandVoiceOver {
    async fn synthesize(&self, _document: &str, text: &str, output: &Path) -> PipelineResult<()> {
        debug!(program = %self.program, output = %output.display(), "Running voice-over command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PipelineError::generation_failed(format!("cannot start {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = async {
                stdin.write_all(text.as_bytes()).await?;
                stdin.shutdown().await
            }
            .await;
            // A command that exits without reading is judged by its exit status.
            if let Err(e) = written {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::generation_failed(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(PipelineError::generation_failed(format!(
                "{} did not write {}",
                self.program,
                output.display()
            )));
        }

        info!(output = %output.display(), "Voice-over saved");
        Ok(())
    }
}

/// Uses voice-overs rendered ahead of time.
///
/// The recording for `doc.txt` is `doc.wav` next to it in the source
/// directory, which survives the per-run directory reset.
#[derive(Debug, Clone)]
pub struct ExistingVoiceOver {
    source_dir: PathBuf,
}

impl ExistingVoiceOver {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    pub fn recording_path(&self, document: &str) -> PathBuf {
        self.source_dir.join(format!("{}.wav", document))
    }
}

#[async_trait]
impl VoiceOverSynthesizer for ExistingVoiceOver {
    async fn synthesize(&self, document: &str, _text: &str, output: &Path) -> PipelineResult<()> {
        let recording = self.recording_path(document);
        if !tokio::fs::try_exists(&recording).await? {
            return Err(PipelineError::generation_failed(format!(
                "no voice-over command configured and {} does not exist",
                recording.display()
            )));
        }

        tokio::fs::copy(&recording, output).await?;
        info!(recording = %recording.display(), output = %output.display(), "Using pre-rendered voice-over");
        Ok(())
    }
}
