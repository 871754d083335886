use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::ports::TextExtractor;
use crate::domain::{FileHistoryItem, FileStatus, SessionStats};
use crate::presentation::state::AppState;

use super::{ErrorResponse, SESSION_ID_HEADER};

#[derive(Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub files: Vec<FileHistoryItem>,
    pub total_count: usize,
    pub session_stats: SessionStats,
}

fn require_session(headers: &HeaderMap) -> Result<String, axum::response::Response> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Session ID required; include the {} header", SESSION_ID_HEADER),
                }),
            )
                .into_response()
        })
}

/// Settled conversions for the caller's session, most recent first.
#[tracing::instrument(skip(state, headers))]
pub async fn history_handler<X>(
    State(state): State<AppState<X>>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = match require_session(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let files = state.history.list(&session_id).await;
    let stats = state.history.stats(&session_id).await;

    tracing::debug!(session_id = %session_id, files = files.len(), "History listed");

    (
        StatusCode::OK,
        Json(HistoryResponse {
            success: true,
            total_count: files.len(),
            files,
            session_stats: stats,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
pub struct FileInfoResponse {
    pub success: bool,
    pub file: FileHistoryItem,
}

#[tracing::instrument(skip(state, headers))]
pub async fn file_info_handler<X>(
    State(state): State<AppState<X>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = match require_session(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.history.get(&session_id, &file_id).await {
        Some(file) => (
            StatusCode::OK,
            Json(FileInfoResponse {
                success: true,
                file,
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("File not found: {}", file_id),
            }),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub file_id: String,
}

#[tracing::instrument(skip(state, headers))]
pub async fn delete_history_handler<X>(
    State(state): State<AppState<X>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = match require_session(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    if state.history.delete(&session_id, &file_id).await {
        (
            StatusCode::OK,
            Json(DeleteResponse {
                success: true,
                message: "File removed from history".to_string(),
                file_id,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("File not found: {}", file_id),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: SessionStats,
}

#[tracing::instrument(skip(state, headers))]
pub async fn session_stats_handler<X>(
    State(state): State<AppState<X>>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = match require_session(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let stats = state.history.stats(&session_id).await;
    (
        StatusCode::OK,
        Json(StatsResponse {
            success: true,
            stats,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
pub struct RedownloadResponse {
    pub success: bool,
    pub message: String,
    pub file_id: String,
    pub download_url: String,
    pub file: FileHistoryItem,
}

/// Readiness check before a client re-fetches a past conversion: the entry
/// must be completed and its artifact still present on disk.
#[tracing::instrument(skip(state, headers))]
pub async fn redownload_handler<X>(
    State(state): State<AppState<X>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let session_id = match require_session(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let Some(file) = state.history.get(&session_id, &file_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("File not found: {}", file_id),
            }),
        )
            .into_response();
    };

    if file.status != FileStatus::Completed {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Only completed files can be re-downloaded".to_string(),
            }),
        )
            .into_response();
    }

    let available = match &file.spreadsheet_path {
        Some(path) => state.artifacts.head(path).await.is_ok(),
        None => false,
    };
    if !available {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Spreadsheet no longer available; it may have expired".to_string(),
            }),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(RedownloadResponse {
            success: true,
            message: "Ready for download".to_string(),
            download_url: format!("/api/download/{}", file_id),
            file_id,
            file,
        }),
    )
        .into_response()
}
