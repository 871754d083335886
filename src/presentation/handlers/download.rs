use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;

use crate::application::ports::TextExtractor;
use crate::domain::{FileStatus, JobId, StoragePath};
use crate::presentation::state::AppState;

use super::{ErrorResponse, SESSION_ID_HEADER};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Streams the rendered spreadsheet. A session's history record is preferred
/// (it knows the display filename); without one, the artifact store is
/// addressed directly by job id.
#[tracing::instrument(skip(state, headers))]
pub async fn download_handler<X>(
    State(state): State<AppState<X>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if let Some(session_id) = &session_id {
        if let Some(file) = state.history.get(session_id, &file_id).await {
            if let Some(path) = &file.spreadsheet_path {
                if let Ok(bytes) = state.artifacts.fetch(path).await {
                    return spreadsheet_response(bytes, &file.converted_filename);
                }
            }
        }
    }

    // Fallback for sessionless jobs: address the artifact by job id.
    let Ok(job_id) = file_id.parse::<JobId>() else {
        return not_found(&file_id);
    };
    let path = StoragePath::artifact(job_id);
    match state.artifacts.fetch(&path).await {
        Ok(bytes) => {
            let filename = format!("bank_statement_{}.xlsx", file_id);
            spreadsheet_response(bytes, &filename)
        }
        Err(e) => {
            tracing::debug!(file_id = %file_id, error = %e, "Artifact not available");
            not_found(&file_id)
        }
    }
}

fn spreadsheet_response(bytes: Vec<u8>, filename: &str) -> axum::response::Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn not_found(file_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("File not found: {}", file_id),
        }),
    )
        .into_response()
}

/// Preview rows for a completed conversion, as stored in history.
#[tracing::instrument(skip(state, headers))]
pub async fn converted_data_handler<X>(
    State(state): State<AppState<X>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if let Some(session_id) = &session_id {
        if let Some(file) = state.history.get(session_id, &file_id).await {
            if file.status == FileStatus::Completed {
                let rows = file.converted_preview.unwrap_or_default();
                return (StatusCode::OK, Json(rows)).into_response();
            }
        }
    }

    not_found(&file_id)
}
