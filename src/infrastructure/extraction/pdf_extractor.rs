use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{ExtractError, TextExtractor};

use super::text_sanitizer::sanitize_extracted_text;

const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Local text extraction backed by `pdf-extract`. Parsing is CPU-bound, so
/// it runs on the blocking pool with a hard timeout.
#[derive(Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    #[tracing::instrument(skip(self, data), fields(filename = %filename))]
    async fn extract_text(&self, data: &[u8], filename: &str) -> Result<String, ExtractError> {
        let bytes = data.to_vec();

        let raw = tokio::time::timeout(
            EXTRACTION_TIMEOUT,
            tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| ExtractError::ExtractionFailed(format!("failed to parse PDF: {e}")))
            }),
        )
        .await
        .map_err(|_| ExtractError::Timeout)?
        .map_err(|e| ExtractError::ExtractionFailed(format!("task join error: {e}")))??;

        let sanitized = sanitize_extracted_text(&raw);
        if sanitized.is_empty() {
            return Err(ExtractError::NoTextFound(filename.to_string()));
        }

        tracing::info!(chars = sanitized.len(), "PDF text extraction complete");
        Ok(sanitized)
    }
}
