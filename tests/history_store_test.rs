use std::sync::Arc;

use bytes::Bytes;

use ledgerlift::application::ports::ArtifactStore;
use ledgerlift::application::services::{HistoryStore, HistoryUpdate};
use ledgerlift::domain::{FileStatus, JobId, ProcessingType, StoragePath};
use ledgerlift::infrastructure::storage::LocalArtifactStore;

fn create_store() -> (tempfile::TempDir, Arc<dyn ArtifactStore>) {
    let dir = tempfile::TempDir::new().unwrap();
    let artifacts: Arc<dyn ArtifactStore> =
        Arc::new(LocalArtifactStore::new(dir.path().to_path_buf()).unwrap());
    (dir, artifacts)
}

async fn stored_artifact(artifacts: &Arc<dyn ArtifactStore>) -> StoragePath {
    let path = StoragePath::artifact(JobId::new());
    artifacts
        .store(&path, Bytes::from_static(b"workbook"))
        .await
        .unwrap();
    path
}

#[tokio::test]
async fn given_new_file_when_added_then_it_is_retrievable() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::new(artifacts);

    history
        .add("s1", "f1", "statement.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;

    let item = history.get("s1", "f1").await.expect("entry exists");
    assert_eq!(item.original_filename, "statement.pdf");
    assert_eq!(item.converted_filename, "statement_converted.xlsx");
    assert_eq!(item.status, FileStatus::Processing);
}

#[tokio::test]
async fn given_in_flight_entry_when_listing_then_it_is_withheld() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::new(artifacts);

    history
        .add("s1", "f1", "a.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    assert!(history.list("s1").await.is_empty());

    history
        .update("s1", "f1", HistoryUpdate::status(FileStatus::Completed))
        .await;
    let listed = history.list("s1").await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, FileStatus::Completed);
}

#[tokio::test]
async fn given_resubmitted_file_id_when_added_then_entry_is_replaced_in_place() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::new(artifacts);

    history
        .add("s1", "f1", "first.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    history
        .add("s1", "f2", "second.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    history
        .add("s1", "f1", "first-retry.pdf", ProcessingType::Ai, FileStatus::Processing)
        .await;

    let item = history.get("s1", "f1").await.unwrap();
    assert_eq!(item.original_filename, "first-retry.pdf");
    assert_eq!(item.processing_type, ProcessingType::Ai);

    // Two distinct files, no duplicate from the resubmission.
    history
        .update("s1", "f1", HistoryUpdate::status(FileStatus::Completed))
        .await;
    history
        .update("s1", "f2", HistoryUpdate::status(FileStatus::Completed))
        .await;
    assert_eq!(history.list("s1").await.len(), 2);
}

#[tokio::test]
async fn given_full_session_when_adding_then_oldest_is_evicted_and_artifact_deleted() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::with_limits(Arc::clone(&artifacts), chrono::Duration::days(7), 3);

    let old_artifact = stored_artifact(&artifacts).await;
    history
        .add("s1", "f0", "oldest.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    let updated = history
        .update(
            "s1",
            "f0",
            HistoryUpdate {
                status: FileStatus::Completed,
                spreadsheet_path: Some(old_artifact.clone()),
                file_size: Some(8),
                preview_rows: None,
            },
        )
        .await;
    assert!(updated);

    for i in 1..=3 {
        history
            .add(
                "s1",
                &format!("f{i}"),
                "next.pdf",
                ProcessingType::Basic,
                FileStatus::Processing,
            )
            .await;
    }

    assert!(history.get("s1", "f0").await.is_none(), "oldest not evicted");
    assert!(
        artifacts.fetch(&old_artifact).await.is_err(),
        "evicted artifact still on disk"
    );
}

#[tokio::test]
async fn given_entry_with_artifact_when_deleted_then_artifact_is_removed() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::new(Arc::clone(&artifacts));

    let artifact = stored_artifact(&artifacts).await;
    history
        .add("s1", "f1", "a.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    history
        .update(
            "s1",
            "f1",
            HistoryUpdate {
                status: FileStatus::Completed,
                spreadsheet_path: Some(artifact.clone()),
                file_size: Some(8),
                preview_rows: None,
            },
        )
        .await;

    assert!(history.delete("s1", "f1").await);
    assert!(history.get("s1", "f1").await.is_none());
    assert!(artifacts.fetch(&artifact).await.is_err());

    // Second delete finds nothing.
    assert!(!history.delete("s1", "f1").await);
}

#[tokio::test]
async fn given_unknown_entry_when_updating_then_not_found() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::new(artifacts);

    assert!(
        !history
            .update("s1", "missing", HistoryUpdate::status(FileStatus::Failed))
            .await
    );
}

#[tokio::test]
async fn given_mixed_outcomes_when_counting_then_stats_reflect_them() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::new(artifacts);

    history
        .add("s1", "f1", "a.pdf", ProcessingType::Ai, FileStatus::Processing)
        .await;
    history
        .update("s1", "f1", HistoryUpdate::status(FileStatus::Completed))
        .await;
    history
        .add("s1", "f2", "b.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    history
        .update("s1", "f2", HistoryUpdate::status(FileStatus::Failed))
        .await;

    let stats = history.stats("s1").await;
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.completed_files, 1);
    assert_eq!(stats.failed_files, 1);
    assert_eq!(stats.ai_conversions, 1);
    assert_eq!(stats.basic_conversions, 1);
    assert!(stats.session_created.is_some());
}

#[tokio::test]
async fn given_expired_session_when_accessed_then_it_is_gone_and_artifacts_deleted() {
    let (_dir, artifacts) = create_store();
    let history = HistoryStore::with_limits(
        Arc::clone(&artifacts),
        chrono::Duration::milliseconds(200),
        50,
    );

    let artifact = stored_artifact(&artifacts).await;
    history
        .add("s1", "f1", "a.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    let updated = history
        .update(
            "s1",
            "f1",
            HistoryUpdate {
                status: FileStatus::Completed,
                spreadsheet_path: Some(artifact.clone()),
                file_size: Some(8),
                preview_rows: None,
            },
        )
        .await;
    assert!(updated, "entry should still be live inside the TTL");

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    assert!(history.get("s1", "f1").await.is_none());
    assert!(history.list("s1").await.is_empty());
    assert!(artifacts.fetch(&artifact).await.is_err());
}

#[tokio::test]
async fn given_expired_session_when_swept_then_it_is_purged() {
    let (_dir, artifacts) = create_store();
    let history =
        HistoryStore::with_limits(Arc::clone(&artifacts), chrono::Duration::zero(), 50);

    history
        .add("s1", "f1", "a.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;
    history
        .add("s2", "f2", "b.pdf", ProcessingType::Basic, FileStatus::Processing)
        .await;

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let purged = history.sweep_expired().await;
    assert_eq!(purged, 2);
    assert_eq!(history.session_count(), 0);
    assert_eq!(history.file_count(), 0);
}
