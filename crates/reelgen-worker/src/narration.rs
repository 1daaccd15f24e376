//! Narration generation through a chat-completions API.
//!
//! The model turns an input document into the labelled, `###`-delimited
//! narration the segmenter reads.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Generation attempts per document.
pub const MAX_GENERATION_ATTEMPTS: usize = 3;

/// An output this long (in words) is accepted without further attempts.
pub const TARGET_WORD_COUNT: usize = 500;

const MAX_TOKENS: u32 = 1500;

/// Produces raw narration text for an input document.
#[async_trait]
pub trait NarrationGenerator: Send + Sync {
    async fn generate(&self, input: &str) -> PipelineResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client.
pub struct OpenAiNarrator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    system_prompt: String,
}

impl OpenAiNarrator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        system_prompt: impl Into<String>,
        timeout: Duration,
    ) -> PipelineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            system_prompt: system_prompt.into(),
        })
    }

    /// Build from config, reading the system prompt from `prompt_path`.
    pub async fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| PipelineError::config_error("OPENAI_API_KEY not set"))?;
        let system_prompt = read_prompt(&config.prompt_path).await?;
        info!(model = %config.openai_model, prompt = %config.prompt_path.display(), "Narration model initialized");

        Self::new(
            api_key,
            config.openai_model.clone(),
            config.openai_base_url.clone(),
            system_prompt,
            config.request_timeout,
        )
    }
}

async fn read_prompt(path: &Path) -> PipelineResult<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        PipelineError::config_error(format!("cannot read prompt {}: {}", path.display(), e))
    })
}

#[async_trait]
impl NarrationGenerator for OpenAiNarrator {
    async fn generate(&self, input: &str) -> PipelineResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            max_tokens: MAX_TOKENS,
        };

        debug!("Requesting narration from {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::generation_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::generation_failed(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            PipelineError::generation_failed(format!("failed to parse response: {}", e))
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::generation_failed("no content in response"))
    }
}

/// Stands in when no API credentials are configured; every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableNarrator {
    reason: String,
}

impl UnavailableNarrator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl NarrationGenerator for UnavailableNarrator {
    async fn generate(&self, _input: &str) -> PipelineResult<String> {
        Err(PipelineError::generation_failed(self.reason.clone()))
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Run the generator up to [`MAX_GENERATION_ATTEMPTS`] times and keep the
/// longest output, with quote characters removed.
///
/// Stops early once the kept output reaches [`TARGET_WORD_COUNT`] words. A
/// failed attempt is logged; if every attempt fails the last error is returned.
pub async fn generate_narration(
    generator: &dyn NarrationGenerator,
    input: &str,
) -> PipelineResult<String> {
    let mut best = String::new();
    let mut last_error = None;

    for attempt in 1..=MAX_GENERATION_ATTEMPTS {
        match generator.generate(input).await {
            Ok(output) => {
                let cleaned = output.replace(['"', '\''], "");
                if word_count(&cleaned) > word_count(&best) {
                    best = cleaned;
                }
                debug!(attempt = attempt, words = word_count(&best), "Narration attempt");
                if word_count(&best) >= TARGET_WORD_COUNT {
                    break;
                }
            }
            Err(e) => {
                warn!(attempt = attempt, "Narration attempt failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    if best.is_empty() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    info!(words = word_count(&best), "Narration generated");
    Ok(best)
}
