use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{JobId, ProgressEvent};

/// Buffer for one subscriber's outbound events. Pipelines emit a handful of
/// events per stage, so a small bound is enough; a subscriber that cannot
/// drain this many is treated as gone.
const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(Uuid);

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<ProgressEvent>,
}

/// Per-job pub/sub with at most one live subscriber and a last-value cache
/// replayed to late or reconnecting subscribers. Publishing is decoupled
/// from subscriber presence: a job runs to completion whether or not anyone
/// is watching.
pub struct ProgressChannel {
    subscribers: Mutex<HashMap<JobId, Subscriber>>,
    last_events: Mutex<HashMap<JobId, ProgressEvent>>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            last_events: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the sole live subscriber for `job_id`, displacing any prior
    /// one (its sender is dropped, not notified). The cached last event, if
    /// any, is queued into the fresh channel before this returns, so a
    /// reconnecting client immediately sees where the job stands.
    pub fn attach(&self, job_id: JobId) -> (SubscriberId, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = SubscriberId(Uuid::new_v4());

        if let Some(cached) = self
            .last_events
            .lock()
            .expect("progress cache lock poisoned")
            .get(&job_id)
            .cloned()
        {
            // Fresh channel with capacity > 0; the replay cannot fail here.
            let _ = tx.try_send(cached);
        }

        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .insert(job_id, Subscriber { id, tx });

        tracing::info!(job_id = %job_id, "Progress subscriber attached");
        (id, rx)
    }

    /// Clears the live subscriber only if it is still the caller's; a
    /// subscriber displaced by a newer attach must not tear the newer one
    /// down on its way out.
    pub fn detach(&self, job_id: JobId, subscriber_id: SubscriberId) {
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        if subscribers
            .get(&job_id)
            .is_some_and(|s| s.id == subscriber_id)
        {
            subscribers.remove(&job_id);
            tracing::info!(job_id = %job_id, "Progress subscriber detached");
        }
    }

    /// Caches the event unconditionally, then best-effort delivers it to the
    /// live subscriber. A failed delivery (receiver gone or wedged) detaches
    /// that subscriber; publishing itself never fails.
    pub fn publish(&self, job_id: JobId, event: ProgressEvent) {
        self.last_events
            .lock()
            .expect("progress cache lock poisoned")
            .insert(job_id, event.clone());

        self.deliver(job_id, event);
    }

    /// Builds a clamped event from its fields and publishes it.
    pub fn broadcast_status(
        &self,
        job_id: JobId,
        status: &str,
        progress: i64,
        message: &str,
        data: Option<HashMap<String, serde_json::Value>>,
    ) {
        let event = ProgressEvent::new(job_id, status, progress, message, data);
        tracing::debug!(
            job_id = %job_id,
            status = %event.status,
            progress = event.progress,
            "Progress update"
        );
        self.publish(job_id, event);
    }

    /// Delivery without touching the cache: control acknowledgements (pong,
    /// status snapshots) must not displace the last real progress event that
    /// replay depends on.
    pub fn send_control(&self, job_id: JobId, event: ProgressEvent) {
        self.deliver(job_id, event);
    }

    /// Drops the subscriber registration and the cached event for a job.
    pub fn forget(&self, job_id: JobId) {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .remove(&job_id);
        self.last_events
            .lock()
            .expect("progress cache lock poisoned")
            .remove(&job_id);
    }

    pub fn last_event(&self, job_id: JobId) -> Option<ProgressEvent> {
        self.last_events
            .lock()
            .expect("progress cache lock poisoned")
            .get(&job_id)
            .cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .len()
    }

    pub fn connected_jobs(&self) -> Vec<JobId> {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    fn deliver(&self, job_id: JobId, event: ProgressEvent) {
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        if let Some(subscriber) = subscribers.get(&job_id) {
            if subscriber.tx.try_send(event).is_err() {
                tracing::warn!(job_id = %job_id, "Subscriber unreachable, detaching");
                subscribers.remove(&job_id);
            }
        }
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}
