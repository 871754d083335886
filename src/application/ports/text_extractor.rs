use async_trait::async_trait;

/// Pulls a raw text blob out of uploaded document bytes. Implementations
/// wrap whatever extraction backend is configured; the pipeline only sees
/// text or an error.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, data: &[u8], filename: &str) -> Result<String, ExtractError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no extractable text in {0}")]
    NoTextFound(String),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("extraction timed out")]
    Timeout,
}
