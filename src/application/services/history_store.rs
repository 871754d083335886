use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::application::ports::ArtifactStore;
use crate::domain::{
    FileHistoryItem, FileStatus, ProcessingType, SessionStats, StoragePath, UserSession,
};

const SESSION_TTL_DAYS: i64 = 7;
const MAX_FILES_PER_SESSION: usize = 50;

/// Fields a pipeline may set on a history entry when its job settles.
#[derive(Debug)]
pub struct HistoryUpdate {
    pub status: FileStatus,
    pub spreadsheet_path: Option<StoragePath>,
    pub file_size: Option<u64>,
    pub preview_rows: Option<Vec<HashMap<String, String>>>,
}

impl HistoryUpdate {
    pub fn status(status: FileStatus) -> Self {
        Self {
            status,
            spreadsheet_path: None,
            file_size: None,
            preview_rows: None,
        }
    }
}

/// Session-scoped, time-expiring ledger of conversion outcomes. Sessions
/// idle past the TTL are purged — lazily on access and by a periodic sweep —
/// and every removal path deletes the entries' backing spreadsheets first.
pub struct HistoryStore {
    sessions: Mutex<HashMap<String, UserSession>>,
    artifacts: Arc<dyn ArtifactStore>,
    ttl: chrono::Duration,
    max_files: usize,
}

impl HistoryStore {
    pub fn new(artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self::with_limits(
            artifacts,
            chrono::Duration::days(SESSION_TTL_DAYS),
            MAX_FILES_PER_SESSION,
        )
    }

    pub fn with_limits(
        artifacts: Arc<dyn ArtifactStore>,
        ttl: chrono::Duration,
        max_files: usize,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            artifacts,
            ttl,
            max_files,
        }
    }

    /// Records a submitted file, creating the session on first sight. A
    /// resubmitted `file_id` replaces its entry in place (keeping its
    /// position); a new one is inserted most-recent-first, evicting anything
    /// beyond the per-session cap.
    pub async fn add(
        &self,
        session_id: &str,
        file_id: &str,
        original_filename: &str,
        processing_type: ProcessingType,
        status: FileStatus,
    ) {
        let item = FileHistoryItem::new(
            file_id.to_string(),
            original_filename.to_string(),
            processing_type,
            status,
        );

        let orphaned = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let mut orphaned = Self::expire_if_stale(&mut sessions, session_id, self.ttl);

            let session = sessions
                .entry(session_id.to_string())
                .or_insert_with(|| {
                    tracing::info!(session_id, "New session created");
                    UserSession::new(session_id.to_string())
                });
            session.last_accessed = Utc::now();

            if let Some(existing) = session.files.iter_mut().find(|f| f.file_id == file_id) {
                *existing = item;
                tracing::debug!(session_id, file_id, "History entry replaced");
            } else {
                session.files.insert(0, item);
                while session.files.len() > self.max_files {
                    if let Some(evicted) = session.files.pop() {
                        tracing::info!(
                            session_id,
                            file_id = %evicted.file_id,
                            "History entry evicted past capacity"
                        );
                        orphaned.extend(evicted.spreadsheet_path);
                    }
                }
            }
            orphaned
        };

        self.delete_artifacts(orphaned).await;
    }

    /// Mutates only the supplied fields of one entry. Returns false when the
    /// session or entry is gone (expired, evicted, or never added).
    pub async fn update(&self, session_id: &str, file_id: &str, update: HistoryUpdate) -> bool {
        let (found, orphaned) = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let orphaned = Self::expire_if_stale(&mut sessions, session_id, self.ttl);

            let found = match sessions.get_mut(session_id) {
                Some(session) => {
                    session.last_accessed = Utc::now();
                    match session.files.iter_mut().find(|f| f.file_id == file_id) {
                        Some(entry) => {
                            entry.status = update.status;
                            if update.spreadsheet_path.is_some() {
                                entry.spreadsheet_path = update.spreadsheet_path;
                            }
                            if update.file_size.is_some() {
                                entry.file_size = update.file_size;
                            }
                            if update.preview_rows.is_some() {
                                entry.converted_preview = update.preview_rows;
                            }
                            tracing::debug!(
                                session_id,
                                file_id,
                                status = %entry.status,
                                "History entry updated"
                            );
                            true
                        }
                        None => false,
                    }
                }
                None => false,
            };
            (found, orphaned)
        };

        self.delete_artifacts(orphaned).await;
        found
    }

    /// Only settled outcomes are listed; in-flight entries stay hidden until
    /// their pipeline reports a terminal status.
    pub async fn list(&self, session_id: &str) -> Vec<FileHistoryItem> {
        let (items, orphaned) = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let orphaned = Self::expire_if_stale(&mut sessions, session_id, self.ttl);
            let items = match sessions.get_mut(session_id) {
                Some(session) => {
                    session.last_accessed = Utc::now();
                    session
                        .files
                        .iter()
                        .filter(|f| f.status.is_listable())
                        .cloned()
                        .collect()
                }
                None => Vec::new(),
            };
            (items, orphaned)
        };

        self.delete_artifacts(orphaned).await;
        items
    }

    pub async fn get(&self, session_id: &str, file_id: &str) -> Option<FileHistoryItem> {
        let (item, orphaned) = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let orphaned = Self::expire_if_stale(&mut sessions, session_id, self.ttl);
            let item = match sessions.get_mut(session_id) {
                Some(session) => {
                    session.last_accessed = Utc::now();
                    session.files.iter().find(|f| f.file_id == file_id).cloned()
                }
                None => None,
            };
            (item, orphaned)
        };

        self.delete_artifacts(orphaned).await;
        item
    }

    /// Removes one entry and deletes its backing spreadsheet if present.
    pub async fn delete(&self, session_id: &str, file_id: &str) -> bool {
        let (removed, orphaned) = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let mut orphaned = Self::expire_if_stale(&mut sessions, session_id, self.ttl);
            let removed = match sessions.get_mut(session_id) {
                Some(session) => {
                    session.last_accessed = Utc::now();
                    match session.files.iter().position(|f| f.file_id == file_id) {
                        Some(index) => {
                            let entry = session.files.remove(index);
                            orphaned.extend(entry.spreadsheet_path);
                            tracing::info!(session_id, file_id, "History entry deleted");
                            true
                        }
                        None => false,
                    }
                }
                None => false,
            };
            (removed, orphaned)
        };

        self.delete_artifacts(orphaned).await;
        removed
    }

    pub async fn stats(&self, session_id: &str) -> SessionStats {
        let (stats, orphaned) = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let orphaned = Self::expire_if_stale(&mut sessions, session_id, self.ttl);
            let stats = match sessions.get_mut(session_id) {
                Some(session) => {
                    session.last_accessed = Utc::now();
                    SessionStats {
                        total_files: session.files.len(),
                        completed_files: session
                            .files
                            .iter()
                            .filter(|f| f.status == FileStatus::Completed)
                            .count(),
                        failed_files: session
                            .files
                            .iter()
                            .filter(|f| f.status == FileStatus::Failed)
                            .count(),
                        ai_conversions: session
                            .files
                            .iter()
                            .filter(|f| f.processing_type == ProcessingType::Ai)
                            .count(),
                        basic_conversions: session
                            .files
                            .iter()
                            .filter(|f| f.processing_type == ProcessingType::Basic)
                            .count(),
                        session_created: Some(session.created_at),
                        last_accessed: Some(session.last_accessed),
                    }
                }
                None => SessionStats::default(),
            };
            (stats, orphaned)
        };

        self.delete_artifacts(orphaned).await;
        stats
    }

    /// Purges every session idle past the TTL, artifacts first. Returns the
    /// number of sessions removed.
    pub async fn sweep_expired(&self) -> usize {
        let (expired_count, orphaned) = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            let cutoff = Utc::now() - self.ttl;
            let expired: Vec<String> = sessions
                .values()
                .filter(|s| s.last_accessed < cutoff)
                .map(|s| s.session_id.clone())
                .collect();

            let mut orphaned = Vec::new();
            for session_id in &expired {
                if let Some(session) = sessions.remove(session_id) {
                    orphaned.extend(
                        session
                            .files
                            .into_iter()
                            .filter_map(|f| f.spreadsheet_path),
                    );
                    tracing::info!(session_id, "Expired session purged");
                }
            }
            (expired.len(), orphaned)
        };

        self.delete_artifacts(orphaned).await;
        expired_count
    }

    /// Periodic sweep loop; spawned once at startup and runs for the process
    /// lifetime.
    pub async fn run_sweeper(self: Arc<Self>, period: Duration) {
        tracing::info!(period_secs = period.as_secs(), "Session sweeper started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = self.sweep_expired().await;
            if purged > 0 {
                tracing::info!(purged, "Session sweep removed expired sessions");
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }

    pub fn file_count(&self) -> usize {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .values()
            .map(|s| s.files.len())
            .sum()
    }

    /// Lazy expiry: drops the session if it has idled past the TTL and hands
    /// back its artifact paths for deletion outside the lock.
    fn expire_if_stale(
        sessions: &mut HashMap<String, UserSession>,
        session_id: &str,
        ttl: chrono::Duration,
    ) -> Vec<StoragePath> {
        let cutoff = Utc::now() - ttl;
        let stale = sessions
            .get(session_id)
            .is_some_and(|s| s.last_accessed < cutoff);
        if !stale {
            return Vec::new();
        }

        let session = sessions
            .remove(session_id)
            .expect("stale session present above");
        tracing::info!(session_id, "Idle session expired on access");
        session
            .files
            .into_iter()
            .filter_map(|f| f.spreadsheet_path)
            .collect()
    }

    async fn delete_artifacts(&self, paths: Vec<StoragePath>) {
        for path in paths {
            if let Err(e) = self.artifacts.delete(&path).await {
                tracing::warn!(error = %e, path = %path, "Failed to delete orphaned artifact");
            }
        }
    }
}
