use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// One status update emitted by a conversion pipeline. Immutable once built;
/// events for a single job are produced by exactly one pipeline instance, so
/// delivery order matches production order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub file_id: String,
    pub status: String,
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl ProgressEvent {
    pub fn new(
        job_id: JobId,
        status: impl Into<String>,
        progress: i64,
        message: impl Into<String>,
        data: Option<HashMap<String, serde_json::Value>>,
    ) -> Self {
        Self {
            file_id: job_id.to_string(),
            status: status.into(),
            progress: progress.clamp(0, 100) as u8,
            message: message.into(),
            timestamp: Utc::now(),
            data: data.unwrap_or_default(),
        }
    }
}
