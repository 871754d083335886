use async_trait::async_trait;

use crate::domain::TableData;

/// Turns extracted statement text into structured rows. Two interchangeable
/// implementations: a local line parser and a remote model-backed one with
/// its own retry policy.
#[async_trait]
pub trait StatementParser: Send + Sync {
    async fn parse(&self, text: &str) -> Result<TableData, ParseError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no transaction data found")]
    NoData,
    #[error("authentication rejected: {0}")]
    Unauthorized(String),
    #[error("rate limited after retries")]
    RateLimited,
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    #[error("parsing failed: {0}")]
    ParsingFailed(String),
}
