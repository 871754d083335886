use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoragePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
            FileStatus::Cancelled => "cancelled",
        }
    }

    /// Listing only surfaces settled outcomes; in-flight entries are withheld.
    pub fn is_listable(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Failed)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingType {
    Basic,
    Ai,
}

impl ProcessingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingType::Basic => "basic",
            ProcessingType::Ai => "ai",
        }
    }
}

impl fmt::Display for ProcessingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One conversion outcome in a session's ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHistoryItem {
    pub file_id: String,
    pub original_filename: String,
    pub converted_filename: String,
    pub upload_time: DateTime<Utc>,
    pub status: FileStatus,
    pub processing_type: ProcessingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_path: Option<StoragePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_preview: Option<Vec<HashMap<String, String>>>,
}

impl FileHistoryItem {
    pub fn new(
        file_id: String,
        original_filename: String,
        processing_type: ProcessingType,
        status: FileStatus,
    ) -> Self {
        let stem = original_filename
            .strip_suffix(".pdf")
            .unwrap_or(&original_filename);
        Self {
            file_id,
            converted_filename: format!("{}_converted.xlsx", stem),
            original_filename,
            upload_time: Utc::now(),
            status,
            processing_type,
            file_size: None,
            spreadsheet_path: None,
            converted_preview: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub session_id: String,
    pub files: Vec<FileHistoryItem>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl UserSession {
    pub fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            files: Vec::new(),
            created_at: now,
            last_accessed: now,
        }
    }
}

/// Per-session counters returned by the history stats endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub ai_conversions: usize,
    pub basic_conversions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
}
