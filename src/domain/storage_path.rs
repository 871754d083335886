use std::fmt;

use serde::{Deserialize, Serialize};

use super::JobId;

/// Location of a staged upload or rendered artifact inside the artifact
/// store, keyed by job id so every job's files are addressable without a
/// directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn staged_input(job_id: JobId) -> Self {
        Self(format!("staging/{}.pdf", job_id))
    }

    pub fn artifact(job_id: JobId) -> Self {
        Self(format!("converted/{}.xlsx", job_id))
    }

    pub fn from_raw(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
