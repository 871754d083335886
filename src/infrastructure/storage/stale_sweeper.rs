use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::application::ports::ArtifactStore;

/// Staged uploads are only needed while their pipeline runs; anything older
/// than this is an orphan from a crashed or abandoned job.
const STAGED_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// Artifacts for sessionless jobs have no history entry to delete them, so
/// they age out on the same horizon as session history.
const ARTIFACT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

/// Periodic sweep of the artifact store: stale staged inputs after 30
/// minutes, untracked artifacts after the history retention window. Spawned
/// once at startup and runs for the process lifetime.
pub async fn run_stale_file_sweeper(store: Arc<dyn ArtifactStore>, period: Duration) {
    tracing::info!(period_secs = period.as_secs(), "Stale file sweeper started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;
    loop {
        interval.tick().await;
        if let Err(e) = sweep_once(store.as_ref()).await {
            tracing::error!(error = %e, "Stale file sweep failed");
        }
    }
}

async fn sweep_once(store: &dyn ArtifactStore) -> Result<(), crate::application::ports::ArtifactStoreError> {
    let now = Utc::now();
    let mut deleted = 0usize;

    for (path, last_modified) in store.list().await? {
        let max_age = if path.as_str().starts_with("staging/") {
            STAGED_MAX_AGE
        } else {
            ARTIFACT_MAX_AGE
        };

        let age = (now - last_modified).to_std().unwrap_or_default();
        if age <= max_age {
            continue;
        }

        match store.delete(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path, age_secs = age.as_secs(), "Stale file deleted");
                deleted += 1;
            }
            Err(e) => tracing::warn!(error = %e, path = %path, "Failed to delete stale file"),
        }
    }

    if deleted > 0 {
        tracing::info!(deleted, "Stale file sweep complete");
    }
    Ok(())
}
