use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::{JobId, TaskSnapshot, TaskStatus};

/// Terminal failure of a registered task, as classified into its record.
#[derive(Debug, Clone)]
pub enum TaskError {
    Cancelled,
    Failed(String),
}

struct JobEntry {
    generation: u64,
    token: CancellationToken,
    task_name: String,
    status: TaskStatus,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

/// Owns the lifecycle of one concurrent conversion task per job id:
/// start, cooperative cancellation, completion bookkeeping, cleanup.
///
/// The record map is touched only through short non-awaiting critical
/// sections; the mutex is never held across a suspension point.
pub struct JobRegistry {
    entries: Arc<Mutex<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers and spawns `work` for `job_id`. An existing task under the
    /// same id is cancelled first (best-effort, without waiting for its
    /// teardown); at most one pipeline instance is ever active per id.
    ///
    /// `work` receives a fresh cancellation token to poll at its checkpoints
    /// and to race long awaits against. A watcher task awaits the join handle
    /// and classifies the outcome into the record, so panics inside the work
    /// are surfaced as failures rather than swallowed.
    pub fn start<F, Fut>(&self, job_id: JobId, task_name: &str, work: F) -> CancellationToken
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = {
            let mut entries = self.entries.lock().expect("registry lock poisoned");

            if let Some(existing) = entries.get(&job_id) {
                if existing.status == TaskStatus::Running {
                    tracing::info!(job_id = %job_id, "Cancelling existing task before restart");
                    existing.token.cancel();
                }
            }

            let generation = entries
                .get(&job_id)
                .map(|e| e.generation + 1)
                .unwrap_or(0);

            entries.insert(
                job_id,
                JobEntry {
                    generation,
                    token: token.clone(),
                    task_name: task_name.to_string(),
                    status: TaskStatus::Running,
                    started_at: Utc::now(),
                    finished_at: None,
                    error: None,
                },
            );
            generation
        };

        let handle = tokio::spawn(work(token.clone()));

        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            let (status, error) = match handle.await {
                Ok(Ok(())) => (TaskStatus::Completed, None),
                Ok(Err(TaskError::Cancelled)) => (TaskStatus::Cancelled, None),
                Ok(Err(TaskError::Failed(msg))) => (TaskStatus::Failed, Some(msg)),
                Err(join_err) if join_err.is_cancelled() => (TaskStatus::Cancelled, None),
                Err(join_err) => (TaskStatus::Failed, Some(format!("task panicked: {}", join_err))),
            };
            record_outcome(&entries, job_id, generation, status, error);
        });

        tracing::info!(job_id = %job_id, task_name, "Task started");
        token
    }

    /// Requests cooperative interruption. Returns whether a running task was
    /// found; the task itself observes the token at its own checkpoints.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let entries = self.entries.lock().expect("registry lock poisoned");
        match entries.get(&job_id) {
            Some(entry) if entry.status == TaskStatus::Running => {
                entry.token.cancel();
                tracing::info!(job_id = %job_id, "Task cancellation requested");
                true
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self, job_id: JobId) -> bool {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries
            .get(&job_id)
            .map(|e| e.token.is_cancelled())
            .unwrap_or(false)
    }

    pub fn status(&self, job_id: JobId) -> Option<TaskSnapshot> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries.get(&job_id).map(|e| TaskSnapshot {
            job_id,
            task_name: e.task_name.clone(),
            status: e.status,
            started_at: e.started_at,
            finished_at: e.finished_at,
            error: e.error.clone(),
        })
    }

    /// Removes the record, the token, and any metadata. Idempotent; always
    /// invoked by the pipeline's finalizer.
    pub fn cleanup(&self, job_id: JobId) {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        if entries.remove(&job_id).is_some() {
            tracing::debug!(job_id = %job_id, "Task record removed");
        }
    }

    pub fn running_count(&self) -> usize {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries
            .values()
            .filter(|e| e.status == TaskStatus::Running)
            .count()
    }

    pub fn snapshot_all(&self) -> Vec<TaskSnapshot> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries
            .iter()
            .map(|(job_id, e)| TaskSnapshot {
                job_id: *job_id,
                task_name: e.task_name.clone(),
                status: e.status,
                started_at: e.started_at,
                finished_at: e.finished_at,
                error: e.error.clone(),
            })
            .collect()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn record_outcome(
    entries: &Mutex<HashMap<JobId, JobEntry>>,
    job_id: JobId,
    generation: u64,
    status: TaskStatus,
    error: Option<String>,
) {
    let mut entries = entries.lock().expect("registry lock poisoned");
    let Some(entry) = entries.get_mut(&job_id) else {
        // Cleaned up before the watcher ran; nothing left to classify.
        return;
    };
    if entry.generation != generation {
        // A resubmission replaced this record; the old instance must not
        // clobber the new one's state.
        return;
    }
    entry.status = status;
    entry.finished_at = Some(Utc::now());
    entry.error = error;
    tracing::info!(job_id = %job_id, status = %status, "Task finished");
}
