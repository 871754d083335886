use async_trait::async_trait;

use crate::domain::TableData;

/// Serializes structured rows into spreadsheet bytes ready for storage.
#[async_trait]
pub trait SpreadsheetRenderer: Send + Sync {
    async fn render(&self, table: &TableData) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("nothing to render: {0}")]
    EmptyTable(String),
    #[error("spreadsheet generation failed: {0}")]
    GenerationFailed(String),
}
