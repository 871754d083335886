use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ArtifactStore, ArtifactStoreError, ExtractError, ParseError, RenderError, SpreadsheetRenderer,
    StatementParser, TextExtractor,
};
use crate::application::services::{
    HistoryStore, HistoryUpdate, JobRegistry, ProgressChannel, TaskError,
};
use crate::domain::{FileStatus, JobId, ProcessingType, StoragePath, TableData};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Drives one upload through validate → extract → structure → render →
/// finalize, emitting progress through the channel and observing its
/// cancellation token between stages. Runs detached from the submitting
/// request; terminal state is reported through the channel and the history
/// store, never to the original caller.
pub struct ConversionService<X>
where
    X: TextExtractor,
{
    extractor: Arc<X>,
    ai_parser: Arc<dyn StatementParser>,
    basic_parser: Arc<dyn StatementParser>,
    renderer: Arc<dyn SpreadsheetRenderer>,
    artifacts: Arc<dyn ArtifactStore>,
    registry: Arc<JobRegistry>,
    channel: Arc<ProgressChannel>,
    history: Arc<HistoryStore>,
}

impl<X> ConversionService<X>
where
    X: TextExtractor + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extractor: Arc<X>,
        ai_parser: Arc<dyn StatementParser>,
        basic_parser: Arc<dyn StatementParser>,
        renderer: Arc<dyn SpreadsheetRenderer>,
        artifacts: Arc<dyn ArtifactStore>,
        registry: Arc<JobRegistry>,
        channel: Arc<ProgressChannel>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            extractor,
            ai_parser,
            basic_parser,
            renderer,
            artifacts,
            registry,
            channel,
            history,
        }
    }

    /// Stages the upload, records it in the session's history, and hands the
    /// pipeline to the registry for concurrent execution. Returns as soon as
    /// the task is scheduled; conversion proceeds in the background.
    pub async fn submit(
        self: Arc<Self>,
        job_id: JobId,
        data: Bytes,
        original_filename: String,
        use_ai: bool,
        session_id: Option<String>,
    ) -> Result<(), SubmitError> {
        let staged = StoragePath::staged_input(job_id);
        self.artifacts
            .store(&staged, data)
            .await
            .map_err(SubmitError::Staging)?;

        let processing_type = if use_ai {
            ProcessingType::Ai
        } else {
            ProcessingType::Basic
        };

        if let Some(session_id) = &session_id {
            self.history
                .add(
                    session_id,
                    &job_id.to_string(),
                    &original_filename,
                    processing_type,
                    FileStatus::Processing,
                )
                .await;
        }

        let service = Arc::clone(&self);
        let task_name = format!("pdf_to_xlsx_{}", original_filename);
        self.registry.start(job_id, &task_name, move |token| async move {
            service
                .run(job_id, token, original_filename, use_ai, session_id)
                .await
                .map_err(|e| match e {
                    ConversionError::Cancelled => TaskError::Cancelled,
                    other => TaskError::Failed(other.to_string()),
                })
        });

        Ok(())
    }

    /// One full pipeline pass, including terminal-state reporting and the
    /// unconditional finalizer.
    async fn run(
        self: Arc<Self>,
        job_id: JobId,
        token: CancellationToken,
        original_filename: String,
        use_ai: bool,
        session_id: Option<String>,
    ) -> Result<(), ConversionError> {
        tracing::info!(job_id = %job_id, use_ai, "Conversion started");

        let result = self
            .execute(job_id, &token, &original_filename, use_ai, session_id.as_deref())
            .await;

        match &result {
            Ok(()) => {
                tracing::info!(job_id = %job_id, "Conversion completed");
            }
            Err(ConversionError::Cancelled) => {
                tracing::info!(job_id = %job_id, "Conversion cancelled");
                self.channel
                    .broadcast_status(job_id, "cancelled", 0, "Conversion was cancelled", None);
                if let Some(session_id) = session_id.as_deref() {
                    self.history
                        .update(
                            session_id,
                            &job_id.to_string(),
                            HistoryUpdate::status(FileStatus::Cancelled),
                        )
                        .await;
                }
                self.discard_artifact(job_id).await;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Conversion failed");
                self.channel.broadcast_status(
                    job_id,
                    "failed",
                    0,
                    &format!("Conversion failed: {}", e),
                    None,
                );
                if let Some(session_id) = session_id.as_deref() {
                    self.history
                        .update(
                            session_id,
                            &job_id.to_string(),
                            HistoryUpdate::status(FileStatus::Failed),
                        )
                        .await;
                }
                self.discard_artifact(job_id).await;
            }
        }

        // Finalizer: runs on every exit path.
        let staged = StoragePath::staged_input(job_id);
        if let Err(e) = self.artifacts.delete(&staged).await {
            if !matches!(e, ArtifactStoreError::NotFound(_)) {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to delete staged upload");
            }
        }
        self.registry.cleanup(job_id);

        result
    }

    async fn execute(
        &self,
        job_id: JobId,
        token: &CancellationToken,
        original_filename: &str,
        use_ai: bool,
        session_id: Option<&str>,
    ) -> Result<(), ConversionError> {
        self.channel
            .broadcast_status(job_id, "starting", 0, "Starting conversion", None);

        checkpoint(token)?;
        self.channel
            .broadcast_status(job_id, "validating", 5, "Validating uploaded file", None);
        let staged = StoragePath::staged_input(job_id);
        let data = self.artifacts.fetch(&staged).await?;
        validate_payload(&data)?;

        checkpoint(token)?;
        self.channel
            .broadcast_status(job_id, "extracting", 20, "Extracting text from PDF", None);
        let text = tokio::select! {
            result = self.extractor.extract_text(&data, original_filename) => result?,
            _ = token.cancelled() => return Err(ConversionError::Cancelled),
        };

        checkpoint(token)?;
        let table = if use_ai {
            self.channel
                .broadcast_status(job_id, "processing", 40, "Structuring statement with AI", None);
            let table = tokio::select! {
                result = self.ai_parser.parse(&text) => result?,
                _ = token.cancelled() => return Err(ConversionError::Cancelled),
            };
            self.channel
                .broadcast_status(job_id, "processing", 70, "AI structuring complete", None);
            table
        } else {
            self.channel
                .broadcast_status(job_id, "processing", 50, "Parsing statement text", None);
            self.basic_parser.parse(&text).await?
        };

        checkpoint(token)?;
        self.channel
            .broadcast_status(job_id, "generating", 85, "Rendering spreadsheet", None);
        let artifact = StoragePath::artifact(job_id);
        let rendered = self.renderer.render(&table).await?;
        self.artifacts.store(&artifact, Bytes::from(rendered)).await?;

        checkpoint(token)?;
        self.finish(job_id, original_filename, &table, &artifact, session_id)
            .await
    }

    async fn finish(
        &self,
        job_id: JobId,
        original_filename: &str,
        table: &TableData,
        artifact: &StoragePath,
        session_id: Option<&str>,
    ) -> Result<(), ConversionError> {
        let file_size = self.artifacts.head(artifact).await?;

        let mut data = HashMap::new();
        data.insert(
            "spreadsheet_path".to_string(),
            serde_json::Value::String(artifact.to_string()),
        );
        data.insert(
            "original_filename".to_string(),
            serde_json::Value::String(original_filename.to_string()),
        );
        data.insert("file_size".to_string(), serde_json::Value::from(file_size));

        self.channel
            .broadcast_status(job_id, "completed", 100, "Conversion complete", Some(data));

        if let Some(session_id) = session_id {
            self.history
                .update(
                    session_id,
                    &job_id.to_string(),
                    HistoryUpdate {
                        status: FileStatus::Completed,
                        spreadsheet_path: Some(artifact.clone()),
                        file_size: Some(file_size),
                        preview_rows: Some(table.preview_rows()),
                    },
                )
                .await;
        }

        Ok(())
    }

    /// Removes a partial artifact left behind by a cancelled or failed run.
    async fn discard_artifact(&self, job_id: JobId) {
        let artifact = StoragePath::artifact(job_id);
        match self.artifacts.delete(&artifact).await {
            Ok(()) => tracing::debug!(job_id = %job_id, "Partial artifact removed"),
            Err(ArtifactStoreError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to remove partial artifact")
            }
        }
    }
}

/// Cooperative cancellation checkpoint, polled immediately before each stage
/// transition.
fn checkpoint(token: &CancellationToken) -> Result<(), ConversionError> {
    if token.is_cancelled() {
        Err(ConversionError::Cancelled)
    } else {
        Ok(())
    }
}

fn validate_payload(data: &[u8]) -> Result<(), ConversionError> {
    if data.is_empty() {
        return Err(ConversionError::EmptyUpload);
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ConversionError::OversizedUpload(data.len()));
    }
    if !data.starts_with(PDF_SIGNATURE) {
        return Err(ConversionError::InvalidSignature);
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("conversion was cancelled")]
    Cancelled,
    #[error("uploaded file is empty")]
    EmptyUpload,
    #[error("uploaded file is too large ({0} bytes)")]
    OversizedUpload(usize),
    #[error("uploaded file is not a valid PDF")]
    InvalidSignature,
    #[error("text extraction: {0}")]
    Extraction(#[from] ExtractError),
    #[error("statement structuring: {0}")]
    Structuring(#[from] ParseError),
    #[error("spreadsheet rendering: {0}")]
    Rendering(#[from] RenderError),
    #[error("artifact storage: {0}")]
    Storage(#[from] ArtifactStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("failed to stage upload: {0}")]
    Staging(ArtifactStoreError),
}
