use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ledgerlift::application::services::{JobRegistry, TaskError};
use ledgerlift::domain::{JobId, TaskStatus};

mod helpers;
use helpers::wait_until;

#[tokio::test]
async fn given_running_task_when_queried_then_status_is_running() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = JobId::new();

    registry.start(job_id, "conversion", |_token| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(())
    });

    let snapshot = registry.status(job_id).expect("record installed");
    assert_eq!(snapshot.status, TaskStatus::Running);
    assert_eq!(snapshot.task_name, "conversion");
    assert!(snapshot.finished_at.is_none());

    registry.cancel(job_id);
}

#[tokio::test]
async fn given_finished_task_when_watcher_runs_then_status_is_completed() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = JobId::new();

    registry.start(job_id, "conversion", |_token| async { Ok(()) });

    let settled = wait_until(Duration::from_secs(2), || {
        registry
            .status(job_id)
            .is_some_and(|s| s.status == TaskStatus::Completed)
    })
    .await;
    assert!(settled, "watcher never classified the task as completed");

    let snapshot = registry.status(job_id).unwrap();
    assert!(snapshot.finished_at.is_some());
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn given_failing_task_when_watcher_runs_then_error_is_recorded() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = JobId::new();

    registry.start(job_id, "conversion", |_token| async {
        Err(TaskError::Failed("extraction exploded".to_string()))
    });

    let settled = wait_until(Duration::from_secs(2), || {
        registry
            .status(job_id)
            .is_some_and(|s| s.status == TaskStatus::Failed)
    })
    .await;
    assert!(settled);
    assert_eq!(
        registry.status(job_id).unwrap().error.as_deref(),
        Some("extraction exploded")
    );
}

#[tokio::test]
async fn given_no_task_when_cancelling_then_returns_false() {
    let registry = Arc::new(JobRegistry::new());
    assert!(!registry.cancel(JobId::new()));
}

#[tokio::test]
async fn given_running_task_when_cancelled_then_token_fires_and_status_is_cancelled() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = JobId::new();

    registry.start(job_id, "conversion", |token| async move {
        token.cancelled().await;
        Err(TaskError::Cancelled)
    });

    assert!(registry.cancel(job_id));
    assert!(registry.is_cancelled(job_id));

    let settled = wait_until(Duration::from_secs(2), || {
        registry
            .status(job_id)
            .is_some_and(|s| s.status == TaskStatus::Cancelled)
    })
    .await;
    assert!(settled);
}

#[tokio::test]
async fn given_resubmitted_job_when_old_task_settles_then_new_record_is_kept() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = JobId::new();
    let first_saw_cancel = Arc::new(AtomicBool::new(false));

    let saw = Arc::clone(&first_saw_cancel);
    registry.start(job_id, "first", move |token| async move {
        token.cancelled().await;
        saw.store(true, Ordering::SeqCst);
        Err(TaskError::Cancelled)
    });

    // Same id again: the prior instance must be cancelled before the new one
    // takes over the record.
    registry.start(job_id, "second", |_token| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    });

    let old_cancelled =
        wait_until(Duration::from_secs(2), || first_saw_cancel.load(Ordering::SeqCst)).await;
    assert!(old_cancelled, "prior instance never observed cancellation");

    let settled = wait_until(Duration::from_secs(2), || {
        registry
            .status(job_id)
            .is_some_and(|s| s.status == TaskStatus::Completed)
    })
    .await;
    assert!(settled, "old watcher clobbered the resubmitted record");
    assert_eq!(registry.status(job_id).unwrap().task_name, "second");
}

#[tokio::test]
async fn given_cleaned_up_job_when_queried_then_no_record_remains() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = JobId::new();

    registry.start(job_id, "conversion", |_token| async { Ok(()) });
    registry.cleanup(job_id);

    assert!(registry.status(job_id).is_none());
    assert!(!registry.is_cancelled(job_id));

    // Idempotent.
    registry.cleanup(job_id);
    assert!(registry.status(job_id).is_none());
}

#[tokio::test]
async fn given_panicking_task_when_watcher_runs_then_status_is_failed() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = JobId::new();

    registry.start(job_id, "conversion", |_token| async {
        panic!("boom");
    });

    let settled = wait_until(Duration::from_secs(2), || {
        registry
            .status(job_id)
            .is_some_and(|s| s.status == TaskStatus::Failed)
    })
    .await;
    assert!(settled, "panic was not classified as a failure");
    assert!(registry.status(job_id).unwrap().error.is_some());
}

#[tokio::test]
async fn given_two_jobs_when_running_then_counted_independently() {
    let registry = Arc::new(JobRegistry::new());
    let first = JobId::new();
    let second = JobId::new();

    registry.start(first, "a", |token| async move {
        token.cancelled().await;
        Err(TaskError::Cancelled)
    });
    registry.start(second, "b", |token| async move {
        token.cancelled().await;
        Err(TaskError::Cancelled)
    });

    assert_eq!(registry.running_count(), 2);
    assert_eq!(registry.snapshot_all().len(), 2);

    registry.cancel(first);
    registry.cancel(second);
}
