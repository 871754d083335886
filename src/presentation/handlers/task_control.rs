use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::ports::TextExtractor;
use crate::domain::{JobId, TaskSnapshot};
use crate::presentation::state::AppState;

use super::ErrorResponse;

#[derive(Serialize)]
pub struct TaskStatusBody {
    pub status: String,
    pub task_name: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TaskSnapshot> for TaskStatusBody {
    fn from(snapshot: TaskSnapshot) -> Self {
        Self {
            status: snapshot.status.as_str().to_string(),
            task_name: snapshot.task_name,
            started_at: snapshot.started_at.to_rfc3339(),
            finished_at: snapshot.finished_at.map(|t| t.to_rfc3339()),
            error: snapshot.error,
        }
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatusBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Polling fallback for clients without a live socket.
#[tracing::instrument(skip(state))]
pub async fn task_status_handler<X>(
    State(state): State<AppState<X>>,
    Path(file_id): Path<String>,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let Ok(job_id) = file_id.parse::<JobId>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid file ID: {}", file_id),
            }),
        )
            .into_response();
    };

    match state.registry.status(job_id) {
        Some(snapshot) => (
            StatusCode::OK,
            Json(StatusResponse {
                success: true,
                file_id,
                status: Some(snapshot.into()),
                message: None,
            }),
        )
            .into_response(),
        None => (
            StatusCode::OK,
            Json(StatusResponse {
                success: false,
                file_id,
                status: None,
                message: Some("No such task".to_string()),
            }),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
    pub file_id: String,
}

/// Cancellation fallback, same semantics as the socket's `cancel_request`:
/// the registry sets the flag and the pipeline winds down at its next
/// checkpoint.
#[tracing::instrument(skip(state))]
pub async fn cancel_handler<X>(
    State(state): State<AppState<X>>,
    Path(file_id): Path<String>,
) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    let Ok(job_id) = file_id.parse::<JobId>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid file ID: {}", file_id),
            }),
        )
            .into_response();
    };

    if state.registry.cancel(job_id) {
        (
            StatusCode::OK,
            Json(CancelResponse {
                success: true,
                message: "Cancellation requested".to_string(),
                file_id,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::OK,
            Json(CancelResponse {
                success: false,
                message: "No task to cancel".to_string(),
                file_id,
            }),
        )
            .into_response()
    }
}
