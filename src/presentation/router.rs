use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::application::ports::TextExtractor;
use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    cancel_handler, converted_data_handler, delete_history_handler, download_handler,
    file_info_handler, health_handler, history_handler, progress_ws_handler, redownload_handler,
    session_stats_handler, task_status_handler, upload_handler, ws_status_handler,
};
use crate::application::services::MAX_UPLOAD_BYTES;
use crate::presentation::state::AppState;

// Headroom over the document limit for multipart framing and base64 growth.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES * 2;

pub fn create_router<X>(state: AppState<X>) -> Router
where
    X: TextExtractor + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/upload",
            // Oversized payloads must reach the handler's own size check so
            // clients get a 413 instead of a generic read error.
            post(upload_handler::<X>).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/ws/status", get(ws_status_handler::<X>))
        .route("/api/ws/{file_id}", get(progress_ws_handler::<X>))
        .route("/api/status/{file_id}", get(task_status_handler::<X>))
        .route("/api/cancel/{file_id}", post(cancel_handler::<X>))
        .route("/api/history", get(history_handler::<X>))
        .route("/api/history/stats", get(session_stats_handler::<X>))
        .route(
            "/api/history/{file_id}",
            get(file_info_handler::<X>).delete(delete_history_handler::<X>),
        )
        .route(
            "/api/history/{file_id}/redownload",
            post(redownload_handler::<X>),
        )
        .route("/api/download/{file_id}", get(download_handler::<X>))
        .route("/api/data/{file_id}", get(converted_data_handler::<X>))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
