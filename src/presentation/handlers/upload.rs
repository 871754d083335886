use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use base64::Engine as _;
use base64::engine::general_purpose;
use bytes::Bytes;
use serde::Serialize;

use crate::application::ports::TextExtractor;
use crate::application::services::MAX_UPLOAD_BYTES;
use crate::domain::{JobId, ProcessingType};
use crate::presentation::state::AppState;

use super::{ErrorResponse, SESSION_ID_HEADER};

#[derive(Serialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub message: String,
    pub processing_type: ProcessingType,
}

/// Accepts a statement either as a multipart `file` part or as a base64
/// `file_data` part, validates it synchronously, and schedules the
/// conversion in the background. The response carries the job id; outcome is
/// observed over the progress socket, by polling, or through history.
#[tracing::instrument(skip(state, headers, multipart))]
pub async fn upload_handler<X>(
    State(state): State<AppState<X>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let mut file_bytes: Option<Bytes> = None;
    let mut file_field_name: Option<String> = None;
    let mut encoded_data: Option<String> = None;
    let mut use_ai = false;
    let mut original_filename: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read multipart");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("Failed to read multipart: {}", e),
                    }),
                )
                    .into_response();
            }
        };

        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                file_field_name = field.file_name().map(String::from);
                match field.bytes().await {
                    Ok(bytes) => file_bytes = Some(bytes),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read file bytes");
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse {
                                error: format!("Failed to read file: {}", e),
                            }),
                        )
                            .into_response();
                    }
                }
            }
            "file_data" => {
                encoded_data = field.text().await.ok();
            }
            "use_ai" => {
                use_ai = field
                    .text()
                    .await
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false);
            }
            "original_filename" => {
                original_filename = field.text().await.ok().filter(|v| !v.is_empty());
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let data = match (file_bytes, encoded_data) {
        (Some(bytes), _) => bytes,
        (None, Some(encoded)) => match general_purpose::STANDARD.decode(encoded.trim()) {
            Ok(decoded) => Bytes::from(decoded),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed base64 payload");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "Invalid base64 file data".to_string(),
                    }),
                )
                    .into_response();
            }
        },
        (None, None) => {
            tracing::warn!("Upload request with no file");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "No file provided".to_string(),
                }),
            )
                .into_response();
        }
    };

    let filename = original_filename
        .or(file_field_name)
        .unwrap_or_else(|| "document.pdf".to_string());

    if !filename.to_lowercase().ends_with(".pdf") {
        tracing::warn!(filename = %filename, "Rejected non-PDF upload");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Only PDF files can be uploaded".to_string(),
            }),
        )
            .into_response();
    }

    if data.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Uploaded file is empty".to_string(),
            }),
        )
            .into_response();
    }

    if data.len() > MAX_UPLOAD_BYTES {
        tracing::warn!(bytes = data.len(), "Rejected oversized upload");
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ErrorResponse {
                error: "File too large (max 10MB)".to_string(),
            }),
        )
            .into_response();
    }

    let job_id = JobId::new();
    let processing_type = if use_ai {
        ProcessingType::Ai
    } else {
        ProcessingType::Basic
    };

    if let Err(e) = Arc::clone(&state.conversion_service)
        .submit(job_id, data, filename.clone(), use_ai, session_id)
        .await
    {
        tracing::error!(job_id = %job_id, error = %e, "Failed to schedule conversion");
        state.channel.broadcast_status(
            job_id,
            "failed",
            0,
            &format!("Failed to start conversion: {}", e),
            None,
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Could not start conversion: {}", e),
            }),
        )
            .into_response();
    }

    tracing::info!(
        job_id = %job_id,
        filename = %filename,
        use_ai,
        "Conversion job scheduled"
    );

    (
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            file_id: job_id.to_string(),
            message: "Upload received; conversion is running in the background".to_string(),
            processing_type,
        }),
    )
        .into_response()
}
