use super::scheduler::RefreshScheduler;
use super::task::{RefreshReason, ScheduleRefresh};
use crate::catalog_store::{CatalogEntity, CatalogStore, CatalogWriteEvent};
use crate::server::metrics;
use crate::telemetry::{EventContext, Telemetry};
use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_secs(60);

/// Release ids affected by one catalog write.
///
/// Preference order: the write's `where` clause, then its input data, then
/// its result rows. The result fallback matters for bulk track writes,
/// which may touch several releases; ids are deduplicated preserving first
/// occurrence and empty ids are discarded.
pub fn affected_release_ids(event: &CatalogWriteEvent) -> Vec<String> {
    let preferred = event
        .where_release_id
        .as_ref()
        .or(event.data_release_id.as_ref());
    let ids: Vec<String> = match preferred {
        Some(id) => vec![id.clone()],
        None => {
            let mut seen = HashSet::new();
            event
                .result_release_ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect()
        }
    };
    ids.into_iter().filter(|id| !id.is_empty()).collect()
}

/// Subscribes to catalog write events and converts them into refresh
/// tasks, then periodically drains the queue and dispatches the tasks.
///
/// Dispatch hands each task to the external reindexing pipeline, recorded
/// here as one audit event per task. The post-write path never waits on
/// dispatch; its only cost is the scheduler's map upsert.
pub struct MutationWatcher {
    scheduler: Arc<RefreshScheduler>,
    catalog: Arc<dyn CatalogStore>,
    telemetry: Telemetry,
    dispatch_interval: Duration,
}

impl MutationWatcher {
    pub fn new(
        scheduler: Arc<RefreshScheduler>,
        catalog: Arc<dyn CatalogStore>,
        telemetry: Telemetry,
        dispatch_interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            catalog,
            telemetry,
            dispatch_interval,
        }
    }

    /// React to one completed catalog write.
    pub fn handle_write(&self, event: &CatalogWriteEvent) {
        let reason = match event.entity {
            CatalogEntity::Release => RefreshReason::ReleaseMutated,
            CatalogEntity::ReleaseTrack => RefreshReason::TrackMutated,
        };

        for release_id in affected_release_ids(event) {
            self.scheduler.schedule_regional_refresh(
                ScheduleRefresh::new(release_id, reason)
                    .with_trigger(event.actor_user_id.as_deref()),
            );
        }
    }

    /// Drain the queue and dispatch every pending task.
    pub fn dispatch_pending(&self) {
        let tasks = self.scheduler.process_scheduled_refreshes();
        if tasks.is_empty() {
            return;
        }

        info!("Dispatching {} refresh task(s)", tasks.len());
        for task in &tasks {
            self.telemetry.audit(
                "refresh.dispatched",
                json!({
                    "release_id": task.release_id,
                    "regions": task.regions,
                    "reason": task.reason,
                    "scheduled_at": task.scheduled_at.to_rfc3339(),
                }),
                EventContext::default()
                    .with_actor(task.triggered_by.as_deref())
                    .with_target(task.release_id.clone()),
            );
        }
        metrics::record_refresh_dispatched(tasks.len());
    }

    /// Operator entry point: schedule one manual-rebuild task per release,
    /// bypassing mutation detection. Covers watcher downtime and schema
    /// migrations.
    pub fn trigger_full_rebuild(
        &self,
        regions: Option<Vec<String>>,
        actor: Option<&str>,
    ) -> Result<usize> {
        let release_ids = self
            .catalog
            .list_release_ids()
            .context("Failed to list releases for rebuild")?;
        let count = release_ids.len();

        info!("Full rebuild requested: scheduling {} release(s)", count);
        for release_id in release_ids {
            let mut params =
                ScheduleRefresh::new(release_id, RefreshReason::ManualRebuild).with_trigger(actor);
            if let Some(regions) = &regions {
                params = params.with_regions(regions.iter().cloned());
            }
            self.scheduler.schedule_regional_refresh(params);
        }
        Ok(count)
    }

    /// Run loop: consume write events as they arrive and dispatch pending
    /// refreshes on every tick, until shutdown.
    pub async fn run(
        self: Arc<Self>,
        mut events: UnboundedReceiver<CatalogWriteEvent>,
        shutdown: CancellationToken,
    ) {
        info!(
            "Mutation watcher started (dispatch every {:?})",
            self.dispatch_interval
        );
        let mut ticker = tokio::time::interval(self.dispatch_interval);
        // The first tick fires immediately; skip it so a fresh process does
        // not dispatch an empty batch at startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    debug!(
                        "Catalog write observed: {} {}",
                        event.entity, event.operation
                    );
                    self.handle_write(&event);
                }
                _ = ticker.tick() => {
                    self.dispatch_pending();
                }
                _ = shutdown.cancelled() => {
                    info!("Mutation watcher received shutdown signal");
                    // Final drain so accepted work is not silently dropped.
                    self.dispatch_pending();
                    break;
                }
            }
        }

        info!("Mutation watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{SqliteCatalogStore, WriteOperation};
    use crate::catalog_store::{Release, ReleaseType};
    use crate::telemetry::TelemetryEvent;
    use chrono::Utc;
    use tempfile::TempDir;

    fn release_event() -> CatalogWriteEvent {
        CatalogWriteEvent::new(CatalogEntity::Release, WriteOperation::Update)
    }

    fn track_event() -> CatalogWriteEvent {
        CatalogWriteEvent::new(CatalogEntity::ReleaseTrack, WriteOperation::Create)
    }

    // ==========================================================================
    // Release id extraction
    // ==========================================================================

    #[test]
    fn test_where_clause_id_wins() {
        let event = release_event()
            .with_where_id("from-where")
            .with_data_id("from-data")
            .with_result_ids(["from-result"]);
        assert_eq!(affected_release_ids(&event), vec!["from-where"]);
    }

    #[test]
    fn test_data_id_beats_result_ids() {
        let event = release_event()
            .with_data_id("from-data")
            .with_result_ids(["from-result"]);
        assert_eq!(affected_release_ids(&event), vec!["from-data"]);
    }

    #[test]
    fn test_result_ids_are_the_fallback() {
        let event = release_event().with_result_ids(["from-result"]);
        assert_eq!(affected_release_ids(&event), vec!["from-result"]);
    }

    #[test]
    fn test_batch_result_ids_are_deduplicated() {
        let event = track_event().with_result_ids(["rel-1", "rel-2", "rel-1", "rel-3", "rel-2"]);
        assert_eq!(
            affected_release_ids(&event),
            vec!["rel-1", "rel-2", "rel-3"]
        );
    }

    #[test]
    fn test_empty_ids_are_discarded() {
        let event = track_event().with_result_ids(["", "rel-1", ""]);
        assert_eq!(affected_release_ids(&event), vec!["rel-1"]);

        let no_ids = release_event();
        assert!(affected_release_ids(&no_ids).is_empty());
    }

    // ==========================================================================
    // Watcher behavior
    // ==========================================================================

    fn watcher_fixture(
        telemetry: Telemetry,
    ) -> (Arc<MutationWatcher>, Arc<RefreshScheduler>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let catalog =
            Arc::new(SqliteCatalogStore::new(temp_dir.path().join("catalog.db")).unwrap());
        let scheduler = Arc::new(RefreshScheduler::new(telemetry.clone()));
        let watcher = Arc::new(MutationWatcher::new(
            scheduler.clone(),
            catalog,
            telemetry,
            Duration::from_millis(50),
        ));
        (watcher, scheduler, temp_dir)
    }

    #[test]
    fn test_release_write_schedules_release_mutated() {
        let (watcher, scheduler, _dir) = watcher_fixture(Telemetry::disabled());

        watcher.handle_write(
            &release_event()
                .with_where_id("rel-1")
                .with_actor(Some("editor-1")),
        );

        let tasks = scheduler.drain_scheduled_refreshes();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].reason, RefreshReason::ReleaseMutated);
        assert_eq!(tasks[0].triggered_by.as_deref(), Some("editor-1"));
    }

    #[test]
    fn test_track_write_schedules_track_mutated_per_release() {
        let (watcher, scheduler, _dir) = watcher_fixture(Telemetry::disabled());

        watcher.handle_write(&track_event().with_result_ids(["rel-1", "rel-2", "rel-1"]));

        let tasks = scheduler.drain_scheduled_refreshes();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.reason == RefreshReason::TrackMutated));
    }

    #[test]
    fn test_full_rebuild_schedules_every_release() {
        let temp_dir = TempDir::new().unwrap();
        let catalog =
            Arc::new(SqliteCatalogStore::new(temp_dir.path().join("catalog.db")).unwrap());
        for i in 0..3 {
            let created = Utc::now();
            catalog
                .create_release(
                    &Release {
                        id: format!("rel-{}", i),
                        title: format!("Release {}", i),
                        description: None,
                        cover_art_id: None,
                        release_type: ReleaseType::Album,
                        creator_id: "creator-1".to_string(),
                        created_at: created,
                        updated_at: created,
                    },
                    None,
                )
                .unwrap();
        }

        let scheduler = Arc::new(RefreshScheduler::new(Telemetry::disabled()));
        let watcher = MutationWatcher::new(
            scheduler.clone(),
            catalog,
            Telemetry::disabled(),
            DEFAULT_DISPATCH_INTERVAL,
        );

        let count = watcher
            .trigger_full_rebuild(Some(vec!["us".to_string()]), Some("operator"))
            .unwrap();
        assert_eq!(count, 3);

        let tasks = scheduler.drain_scheduled_refreshes();
        assert_eq!(tasks.len(), 3);
        for task in &tasks {
            assert_eq!(task.reason, RefreshReason::ManualRebuild);
            assert_eq!(task.regions, vec!["us"]);
            assert_eq!(task.triggered_by.as_deref(), Some("operator"));
        }
    }

    #[tokio::test]
    async fn test_run_loop_drains_and_dispatches() {
        let (telemetry, mut events_rx) = Telemetry::channel();
        let (watcher, scheduler, _dir) = watcher_fixture(telemetry);

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(watcher.clone().run(event_rx, shutdown.clone()));

        event_tx
            .send(release_event().with_where_id("rel-1"))
            .unwrap();

        // Wait for at least one dispatch tick.
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(scheduler.pending_count(), 0);

        let mut dispatched = false;
        while let Ok(event) = events_rx.try_recv() {
            if let TelemetryEvent::Audit { name, .. } = event {
                if name == "refresh.dispatched" {
                    dispatched = true;
                }
            }
        }
        assert!(dispatched, "dispatch audit event should have been emitted");

        shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_tasks() {
        let (telemetry, mut events_rx) = Telemetry::channel();
        let temp_dir = TempDir::new().unwrap();
        let catalog =
            Arc::new(SqliteCatalogStore::new(temp_dir.path().join("catalog.db")).unwrap());
        let scheduler = Arc::new(RefreshScheduler::new(telemetry.clone()));
        // Long interval: the ticker will not fire during the test.
        let watcher = Arc::new(MutationWatcher::new(
            scheduler.clone(),
            catalog,
            telemetry,
            Duration::from_secs(3600),
        ));

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(watcher.clone().run(event_rx, shutdown.clone()));

        event_tx
            .send(release_event().with_where_id("rel-1"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;

        assert_eq!(scheduler.pending_count(), 0);
        let dispatched = std::iter::from_fn(|| events_rx.try_recv().ok())
            .any(|e| matches!(e, TelemetryEvent::Audit { name, .. } if name == "refresh.dispatched"));
        assert!(dispatched, "shutdown should dispatch the pending task");
    }
}
