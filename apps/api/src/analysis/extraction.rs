//! PDF text extraction.
//!
//! `pdf-extract` is synchronous and CPU-bound, so parsing runs on the blocking
//! pool. A panic inside the parser (it happens on hostile input) surfaces as a
//! join error and is reported like any other unreadable document.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF could not be parsed: {0}")]
    Parse(String),

    #[error("PDF parser aborted: {0}")]
    Aborted(String),

    #[error("PDF parsing exceeded {0:?}")]
    TimedOut(Duration),
}

/// Converts a binary document into plain text. Stateless; one call per request.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: Bytes) -> Result<String, ExtractionError>;
}

/// Default extractor backed by `pdf-extract`.
pub struct PdfTextExtractor {
    timeout: Duration,
}

impl PdfTextExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, bytes: Bytes) -> Result<String, ExtractionError> {
        let size = bytes.len();
        let text = run_blocking_with_deadline(self.timeout, move || extract_pdf_text(&bytes)).await?;

        debug!("Extracted {} chars from {} byte PDF", text.chars().count(), size);
        Ok(text)
    }
}

/// Runs `job` on the blocking pool and stops waiting for it after `timeout`.
///
/// A blocking thread cannot be cancelled: on timeout the job keeps running to
/// completion and its result is dropped.
async fn run_blocking_with_deadline<F>(timeout: Duration, job: F) -> Result<String, ExtractionError>
where
    F: FnOnce() -> Result<String, ExtractionError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(job);
    match tokio::time::timeout(timeout, handle).await {
        Ok(joined) => joined.map_err(|e| ExtractionError::Aborted(e.to_string()))?,
        Err(_) => {
            warn!("PDF extraction abandoned after {:?}", timeout);
            Err(ExtractionError::TimedOut(timeout))
        }
    }
}

/// Parses PDF bytes and returns all text in document order, trimmed.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractionError::Parse(e.to_string()))?;
    Ok(text.trim().to_string())
}

/// Returns the first `max_chars` characters of `text`, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
