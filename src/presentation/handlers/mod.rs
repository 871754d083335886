mod download;
mod health;
mod history;
mod progress_ws;
mod task_control;
mod upload;

use serde::Serialize;

pub const SESSION_ID_HEADER: &str = "x-session-id";

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub use download::{converted_data_handler, download_handler};
pub use health::health_handler;
pub use history::{
    delete_history_handler, file_info_handler, history_handler, redownload_handler,
    session_stats_handler,
};
pub use progress_ws::{progress_ws_handler, ws_status_handler};
pub use task_control::{cancel_handler, task_status_handler};
pub use upload::upload_handler;
