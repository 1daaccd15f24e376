//! Structured document logging utilities.
//!
//! Provides consistent, structured logging for document processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Colored human-readable output by default, JSON when `LOG_FORMAT=json`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reelgen_worker=info,reelgen_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Document logger for structured logging with consistent formatting.
///
/// Every event carries the document name and the pipeline stage.
#[derive(Debug, Clone)]
pub struct DocumentLogger {
    document: String,
    operation: String,
}

impl DocumentLogger {
    /// Create a new logger for a document and pipeline stage.
    pub fn new(document: &str, operation: &str) -> Self {
        Self {
            document: document.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Same document, different stage.
    pub fn stage(&self, operation: &str) -> Self {
        Self::new(&self.document, operation)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            document = %self.document,
            operation = %self.operation,
            "Started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            document = %self.document,
            operation = %self.operation,
            "Progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            document = %self.document,
            operation = %self.operation,
            "Warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            document = %self.document,
            operation = %self.operation,
            "Error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            document = %self.document,
            operation = %self.operation,
            "Completed: {}", message
        );
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this document.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "document",
            document = %self.document,
            operation = %self.operation
        )
    }
}
