use super::task::{RefreshTask, ScheduleRefresh};
use crate::server::metrics;
use crate::telemetry::{EventContext, Telemetry};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Deduplicated in-memory queue of pending refresh tasks.
///
/// Enqueue is an O(1) locked upsert keyed by `release + regions + reason`;
/// a later schedule with the same key replaces the earlier task. Drain
/// atomically snapshots and empties the whole map, so no task is drained
/// twice and no enqueue between drains is lost. The mutex is held only for
/// single map operations.
pub struct RefreshScheduler {
    queue: Mutex<HashMap<String, RefreshTask>>,
    telemetry: Telemetry,
}

impl RefreshScheduler {
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            queue: Mutex::new(HashMap::new()),
            telemetry,
        }
    }

    /// Enqueue (or replace) one refresh task. Last write wins for
    /// identical keys, including `triggered_by` and the timestamp.
    pub fn schedule_regional_refresh(&self, params: ScheduleRefresh) {
        let task = RefreshTask::from_params(params, Utc::now());
        let key = task.dedup_key();

        let metadata = json!({
            "release_id": task.release_id,
            "regions": task.regions,
            "reason": task.reason,
        });
        let ctx = EventContext::default()
            .with_actor(task.triggered_by.as_deref())
            .with_target(task.release_id.clone());

        debug!(
            "Scheduling refresh for {} in [{}] ({})",
            task.release_id,
            task.regions.join(","),
            task.reason
        );

        let depth = {
            let mut queue = self.queue.lock().unwrap();
            queue.insert(key, task);
            queue.len()
        };
        metrics::record_refresh_scheduled(depth);

        // One audit + one analytics event per schedule call, whether it was
        // a fresh enqueue or a replacement.
        self.telemetry
            .audit("refresh.scheduled", metadata.clone(), ctx.clone());
        self.telemetry.track("refresh.scheduled", metadata, ctx);
    }

    /// Atomically remove and return every pending task. An immediate
    /// second call returns an empty list.
    pub fn drain_scheduled_refreshes(&self) -> Vec<RefreshTask> {
        let drained: HashMap<String, RefreshTask> =
            std::mem::take(&mut *self.queue.lock().unwrap());
        metrics::set_refresh_queue_depth(0);
        drained.into_values().collect()
    }

    /// Drain and, if anything was pending, record the batch size before
    /// handing the tasks back for dispatch.
    pub fn process_scheduled_refreshes(&self) -> Vec<RefreshTask> {
        let tasks = self.drain_scheduled_refreshes();
        if !tasks.is_empty() {
            self.telemetry.track(
                "refresh.batch_drained",
                json!({ "count": tasks.len() }),
                EventContext::default(),
            );
        }
        tasks
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}
