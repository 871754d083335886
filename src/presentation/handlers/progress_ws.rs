use std::collections::HashMap;

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Serialize;

use crate::application::ports::TextExtractor;
use crate::domain::{JobId, ProgressEvent};
use crate::presentation::state::AppState;

use super::ErrorResponse;

/// Live progress subscription for one job. On attach the channel replays the
/// last known event; while open, inbound control messages (`ping`,
/// `status_request`, `cancel_request`) are answered over the same socket.
/// Disconnecting only clears the subscription — the job keeps running.
pub async fn progress_ws_handler<X>(
    ws: WebSocketUpgrade,
    Path(file_id): Path<String>,
    State(state): State<AppState<X>>,
) -> Response
where
    X: TextExtractor + 'static,
{
    let job_id = match file_id.parse::<JobId>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid file ID: {}", file_id),
                }),
            )
                .into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

async fn handle_socket<X>(socket: WebSocket, state: AppState<X>, job_id: JobId)
where
    X: TextExtractor + 'static,
{
    let (subscriber_id, mut events) = state.channel.attach(job_id);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // Displaced by a newer subscriber; this socket is done.
                    break;
                };
                let payload = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to serialize event");
                        continue;
                    }
                };
                if sink.send(Message::Text(payload.into())).await.is_err() {
                    tracing::info!(job_id = %job_id, "Subscriber send failed, closing");
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&state, job_id, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(job_id = %job_id, "Client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Socket error");
                        break;
                    }
                }
            }
        }
    }

    state.channel.detach(job_id, subscriber_id);
}

/// Inbound control messages; anything unparseable is keepalive noise.
fn handle_client_message<X>(state: &AppState<X>, job_id: JobId, text: &str)
where
    X: TextExtractor + 'static,
{
    let Ok(message) = serde_json::from_str::<serde_json::Value>(text) else {
        tracing::debug!(job_id = %job_id, "Keepalive message");
        return;
    };

    match message.get("action").and_then(|a| a.as_str()) {
        Some("ping") => {
            let mut data = HashMap::new();
            if let Some(timestamp) = message.get("timestamp") {
                data.insert("timestamp".to_string(), timestamp.clone());
            }
            state.channel.send_control(
                job_id,
                ProgressEvent::new(job_id, "pong", 0, "", Some(data)),
            );
        }
        Some("status_request") => match state.registry.status(job_id) {
            Some(snapshot) => {
                let mut data = HashMap::new();
                data.insert(
                    "task_name".to_string(),
                    serde_json::Value::String(snapshot.task_name.clone()),
                );
                data.insert(
                    "started_at".to_string(),
                    serde_json::Value::String(snapshot.started_at.to_rfc3339()),
                );
                if let Some(finished_at) = snapshot.finished_at {
                    data.insert(
                        "finished_at".to_string(),
                        serde_json::Value::String(finished_at.to_rfc3339()),
                    );
                }
                if let Some(error) = &snapshot.error {
                    data.insert(
                        "error".to_string(),
                        serde_json::Value::String(error.clone()),
                    );
                }
                state.channel.send_control(
                    job_id,
                    ProgressEvent::new(
                        job_id,
                        snapshot.status.as_str(),
                        0,
                        "Current task status",
                        Some(data),
                    ),
                );
            }
            None => {
                state.channel.send_control(
                    job_id,
                    ProgressEvent::new(job_id, "not_found", 0, "No such task", None),
                );
            }
        },
        Some("cancel_request") => {
            if state.registry.cancel(job_id) {
                state.channel.send_control(
                    job_id,
                    ProgressEvent::new(job_id, "cancelling", 0, "Cancellation requested", None),
                );
            } else {
                state.channel.send_control(
                    job_id,
                    ProgressEvent::new(job_id, "cancel_failed", 0, "No task to cancel", None),
                );
            }
        }
        other => {
            tracing::debug!(job_id = %job_id, action = ?other, "Ignoring unknown action");
        }
    }
}

#[derive(Serialize)]
pub struct WsStatusResponse {
    pub active_connections: usize,
    pub connected_files: Vec<String>,
    pub running_tasks: usize,
}

/// Channel and registry introspection.
pub async fn ws_status_handler<X>(State(state): State<AppState<X>>) -> impl IntoResponse
where
    X: TextExtractor + 'static,
{
    Json(WsStatusResponse {
        active_connections: state.channel.connection_count(),
        connected_files: state
            .channel
            .connected_jobs()
            .into_iter()
            .map(|id| id.to_string())
            .collect(),
        running_tasks: state.registry.running_count(),
    })
}
