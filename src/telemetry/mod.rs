//! Fire-and-forget audit and analytics emission.
//!
//! Pipeline code never talks to a sink directly: it sends a
//! [`TelemetryEvent`] on an unbounded channel and moves on. A single worker
//! task owns the sinks and forms the error boundary, so a slow or failing
//! sink can neither block nor fail a search or a schedule call.

use crate::server::metrics;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Correlation fields attached to every emitted event.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub actor_user_id: Option<String>,
    pub target: Option<String>,
    pub request_id: Option<String>,
}

impl EventContext {
    pub fn with_actor(mut self, actor: Option<&str>) -> Self {
        self.actor_user_id = actor.map(str::to_string);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    Audit {
        name: &'static str,
        metadata: JsonValue,
        ctx: EventContext,
    },
    Analytics {
        name: &'static str,
        metadata: JsonValue,
        ctx: EventContext,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::Audit { name, .. } => name,
            TelemetryEvent::Analytics { name, .. } => name,
        }
    }
}

/// Durable sink for pipeline actions.
pub trait AuditSink: Send + Sync {
    fn record(&self, name: &str, metadata: &JsonValue, ctx: &EventContext) -> anyhow::Result<()>;
}

/// Best-effort sink for usage/telemetry events.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, name: &str, metadata: &JsonValue, ctx: &EventContext) -> anyhow::Result<()>;
}

/// Analytics sink that emits structured log lines and counts events.
pub struct TracingAnalyticsSink;

impl AnalyticsSink for TracingAnalyticsSink {
    fn track(&self, name: &str, metadata: &JsonValue, ctx: &EventContext) -> anyhow::Result<()> {
        debug!(
            event = name,
            actor = ctx.actor_user_id.as_deref().unwrap_or("-"),
            target = ctx.target.as_deref().unwrap_or("-"),
            %metadata,
            "analytics event"
        );
        metrics::record_analytics_event(name);
        Ok(())
    }
}

/// Cheap-to-clone handle for emitting telemetry from anywhere in the
/// pipeline. Emission is a channel send; it cannot fail the caller.
#[derive(Clone)]
pub struct Telemetry {
    sender: UnboundedSender<TelemetryEvent>,
}

impl Telemetry {
    /// Spawn the worker task that drains events into the given sinks.
    /// Must be called from within a tokio runtime.
    pub fn spawn(audit: Arc<dyn AuditSink>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(receiver, audit, analytics));
        Self { sender }
    }

    /// A handle whose events go nowhere. For tests and tooling that do not
    /// care about telemetry.
    pub fn disabled() -> Self {
        let (sender, _receiver) = mpsc::unbounded_channel();
        Self { sender }
    }

    /// A handle paired with the raw event stream, so tests can assert on
    /// emitted events without standing up sinks.
    pub fn channel() -> (Self, UnboundedReceiver<TelemetryEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn audit(&self, name: &'static str, metadata: JsonValue, ctx: EventContext) {
        self.send(TelemetryEvent::Audit {
            name,
            metadata,
            ctx,
        });
    }

    pub fn track(&self, name: &'static str, metadata: JsonValue, ctx: EventContext) {
        self.send(TelemetryEvent::Analytics {
            name,
            metadata,
            ctx,
        });
    }

    fn send(&self, event: TelemetryEvent) {
        // The worker may be gone during shutdown; events are droppable.
        if self.sender.send(event).is_err() {
            debug!("Telemetry event dropped: worker channel closed");
        }
    }
}

async fn run_worker(
    mut receiver: UnboundedReceiver<TelemetryEvent>,
    audit: Arc<dyn AuditSink>,
    analytics: Arc<dyn AnalyticsSink>,
) {
    while let Some(event) = receiver.recv().await {
        let result = match &event {
            TelemetryEvent::Audit {
                name,
                metadata,
                ctx,
            } => audit.record(name, metadata, ctx),
            TelemetryEvent::Analytics {
                name,
                metadata,
                ctx,
            } => analytics.track(name, metadata, ctx),
        };
        if let Err(e) = result {
            warn!("Failed to emit telemetry event {}: {:#}", event.name(), e);
            metrics::record_telemetry_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct CollectingSink {
        events: Mutex<Vec<String>>,
        fail: bool,
    }

    impl CollectingSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl AuditSink for CollectingSink {
        fn record(
            &self,
            name: &str,
            _metadata: &JsonValue,
            _ctx: &EventContext,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("sink down");
            }
            self.events.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    impl AnalyticsSink for CollectingSink {
        fn track(
            &self,
            name: &str,
            _metadata: &JsonValue,
            _ctx: &EventContext,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("sink down");
            }
            self.events.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_events_reach_their_sink() {
        let audit = CollectingSink::new(false);
        let analytics = CollectingSink::new(false);
        let telemetry = Telemetry::spawn(audit.clone(), analytics.clone());

        telemetry.audit("search.performed", json!({}), EventContext::default());
        telemetry.track("refresh.scheduled", json!({}), EventContext::default());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(
            *audit.events.lock().unwrap(),
            vec!["search.performed".to_string()]
        );
        assert_eq!(
            *analytics.events.lock().unwrap(),
            vec!["refresh.scheduled".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_the_worker() {
        let audit = CollectingSink::new(true);
        let analytics = CollectingSink::new(false);
        let telemetry = Telemetry::spawn(audit, analytics.clone());

        telemetry.audit("search.performed", json!({}), EventContext::default());
        telemetry.track("refresh.scheduled", json!({}), EventContext::default());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // The failing audit sink must not prevent the analytics event.
        assert_eq!(
            *analytics.events.lock().unwrap(),
            vec!["refresh.scheduled".to_string()]
        );
    }

    #[test]
    fn test_disabled_handle_never_panics_outside_runtime() {
        let telemetry = Telemetry::disabled();
        telemetry.audit("search.performed", json!({}), EventContext::default());
    }
}
