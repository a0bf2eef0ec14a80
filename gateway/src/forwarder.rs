//! Forwarder - multi-consumer delivery with per-consumer isolation
//!
//! ```text
//!                    ┌─► filter ─► actions ─► trace ─► deliver   (task: a)
//! Event ─► resolve ──┼─► filter ─► actions ─► trace ─► deliver   (task: b)
//!                    └─► filter ─► actions ─► trace ─► deliver   (task: c)
//! ```
//!
//! Every target gets its own copy of the event data and its own Tokio task.
//! Whatever one consumer's actions or delivery do (mutate, fail, panic) is
//! invisible to the others. `forward` itself never fails.

use crate::actions::process_actions;
use crate::metrics::{self, Metrics};
use crate::registry::{ConsumerRecord, RegistrySnapshot};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use telemux_core::{ConsumerError, Context, ContextEvent, Event};
use tracing::{Instrument, debug, error, info_span, warn};

/// Outcome of forwarding one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReport {
    /// Enabled consumers the event was addressed to
    pub matched: usize,
    /// Addressed consumers skipped because their config is disabled
    pub disabled: usize,
    pub delivered: usize,
    /// `(consumer id, reason)` for every failed or panicked dispatch
    pub failed: Vec<(String, String)>,
    /// Failed actions across all consumers; delivery still happened
    pub actions_failed: usize,
}

impl ForwardReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.actions_failed == 0
    }
}

/// Result of one consumer's dispatch task
struct Dispatch {
    actions_failed: usize,
    result: Result<(), ConsumerError>,
}

/// Delivers events to the consumers they are addressed to
pub struct Forwarder;

impl Forwarder {
    /// Deliver `event` to every consumer of `snapshot` it is addressed to
    ///
    /// Returns once every dispatch has finished. Targets are taken in
    /// registry order; the report lists failures in the same order.
    pub async fn forward(snapshot: &RegistrySnapshot, event: Event) -> ForwardReport {
        if let Some(m) = Metrics::get() {
            m.record_received();
        }

        let mut report = ForwardReport::default();
        let mut handles = Vec::new();

        for record in snapshot.iter().filter(|r| event.is_addressed_to(&r.id)) {
            if !record.config.enable {
                debug!(consumer = %record.id, "Consumer disabled, skipping");
                report.disabled += 1;
                continue;
            }
            report.matched += 1;

            let data = record.filter.apply(&event.data);
            let context_event = ContextEvent::new(event.event_type.clone(), data);
            let span = info_span!("dispatch", consumer = %record.id);
            let handle = tokio::spawn(dispatch(Arc::clone(record), context_event).instrument(span));
            handles.push((record.id.clone(), handle));
        }

        if report.matched == 0 {
            debug!(
                event_type = %event.event_type,
                destinations = ?event.destination_ids,
                "Event matched no consumers"
            );
            if let Some(m) = Metrics::get() {
                m.record_unrouted();
            }
            return report;
        }

        for (id, handle) in handles {
            match handle.await {
                Ok(dispatch) => {
                    report.actions_failed += dispatch.actions_failed;
                    match dispatch.result {
                        Ok(()) => report.delivered += 1,
                        Err(e) => report.failed.push((id, e.to_string())),
                    }
                }
                Err(e) => {
                    error!(consumer = %id, error = %e, "Dispatch task panicked");
                    if let Some(m) = Metrics::get() {
                        m.record_dispatch(&id, metrics::OUTCOME_PANICKED, std::time::Duration::ZERO);
                    }
                    report.failed.push((id, panic_reason(e)));
                }
            }
        }

        report
    }
}

async fn dispatch(record: Arc<ConsumerRecord>, mut event: ContextEvent) -> Dispatch {
    let start = Instant::now();
    let actions = process_actions(&record.id, &mut event, &record.config.actions);

    let ctx = Context {
        consumer_id: record.id.clone(),
        event,
        config: Arc::clone(&record.config),
        metadata: Arc::clone(&record.metadata),
        tracer: record.tracer.clone(),
    };
    if ctx.tracer.is_some() {
        ctx.trace(snapshot(&ctx)).await;
    }

    let result = record.consumer.deliver(ctx).await;
    let outcome = match &result {
        Ok(()) => {
            debug!(kind = record.consumer.name(), "Delivered");
            metrics::OUTCOME_DELIVERED
        }
        Err(e) => {
            warn!(kind = record.consumer.name(), error = %e, "Delivery failed");
            metrics::OUTCOME_FAILED
        }
    };
    if let Some(m) = Metrics::get() {
        m.record_dispatch(&record.id, outcome, start.elapsed());
    }

    Dispatch {
        actions_failed: actions.failed.len(),
        result,
    }
}

/// Post-action view written to the consumer's tracer
fn snapshot(ctx: &Context) -> Value {
    json!({
        "consumer": ctx.trace_name(),
        "type": ctx.event.event_type,
        "data": ctx.event.data,
    })
}

fn panic_reason(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {message}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::filter::DataFilter;
    use crate::registry::ConsumerRegistry;
    use crate::tracer::MemoryTracer;
    use parking_lot::Mutex;
    use telemux_core::{ActionSpec, Consumer, ConsumerConfig};

    // ==========================================================================
    // Test consumers
    // ==========================================================================

    /// Records every context it receives
    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<ContextEvent>>,
    }

    impl Capture {
        fn seen(&self) -> Vec<ContextEvent> {
            self.seen.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl Consumer for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        async fn deliver(&self, ctx: Context) -> Result<(), ConsumerError> {
            self.seen.lock().push(ctx.event);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Consumer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&self, _ctx: Context) -> Result<(), ConsumerError> {
            Err(ConsumerError::Send("downstream closed".to_string()))
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl Consumer for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn deliver(&self, _ctx: Context) -> Result<(), ConsumerError> {
            panic!("boom");
        }
    }

    fn config_with(actions: serde_json::Value) -> ConsumerConfig {
        let actions: Vec<ActionSpec> = serde_json::from_value(actions).unwrap();
        ConsumerConfig::new("capture").with_actions(actions)
    }

    // ==========================================================================
    // Resolution
    // ==========================================================================

    #[tokio::test]
    async fn empty_registry_delivers_nothing() {
        let registry = ConsumerRegistry::new();
        let event = Event::new("t", json!({"a": 1})).with_destinations(["x"]);

        let report = Forwarder::forward(&registry.snapshot(), event).await;
        assert_eq!(report, ForwardReport::default());
    }

    #[tokio::test]
    async fn only_addressed_consumers_receive() {
        let a = Arc::new(Capture::default());
        let b = Arc::new(Capture::default());
        let registry = ConsumerRegistry::new();
        registry
            .register(ConsumerRecord::new("a", ConsumerConfig::new("capture"), a.clone()))
            .unwrap();
        registry
            .register(ConsumerRecord::new("b", ConsumerConfig::new("capture"), b.clone()))
            .unwrap();

        let event = Event::new("t", json!({"n": 1})).with_destinations(["b", "missing"]);
        let report = Forwarder::forward(&registry.snapshot(), event).await;

        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);
        assert!(a.seen().is_empty());
        assert_eq!(b.seen()[0].data, json!({"n": 1}));
    }

    #[tokio::test]
    async fn disabled_consumer_is_skipped() {
        let capture = Arc::new(Capture::default());
        let mut config = ConsumerConfig::new("capture");
        config.enable = false;
        let registry = ConsumerRegistry::new();
        registry
            .register(ConsumerRecord::new("off", config, capture.clone()))
            .unwrap();

        let event = Event::new("t", json!({})).with_destinations(["off"]);
        let report = Forwarder::forward(&registry.snapshot(), event).await;

        assert_eq!(report.matched, 0);
        assert_eq!(report.disabled, 1);
        assert!(capture.seen().is_empty());
    }

    // ==========================================================================
    // Isolation
    // ==========================================================================

    #[tokio::test]
    async fn mutations_do_not_leak_between_consumers() {
        let mutating = Arc::new(Capture::default());
        let plain = Arc::new(Capture::default());
        let registry = ConsumerRegistry::new();
        registry
            .register(ConsumerRecord::new(
                "mutating",
                config_with(json!([
                    {"setTag": {"added": "yes"}},
                    {"excludeData": {}, "locations": {"secret": true}}
                ])),
                mutating.clone(),
            ))
            .unwrap();
        registry
            .register(ConsumerRecord::new("plain", ConsumerConfig::new("capture"), plain.clone()))
            .unwrap();

        let data = json!({"secret": "s", "value": 1});
        let event = Event::new("t", data.clone()).with_destinations(["mutating", "plain"]);
        let report = Forwarder::forward(&registry.snapshot(), event).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(mutating.seen()[0].data, json!({"value": 1, "added": "yes"}));
        assert_eq!(plain.seen()[0].data, data);
    }

    #[tokio::test]
    async fn filter_narrows_only_its_consumer() {
        let narrow = Arc::new(Capture::default());
        let wide = Arc::new(Capture::default());
        let registry = ConsumerRegistry::new();
        registry
            .register(
                ConsumerRecord::new("narrow", ConsumerConfig::new("capture"), narrow.clone())
                    .with_filter(DataFilter::allow(["metrics"])),
            )
            .unwrap();
        registry
            .register(ConsumerRecord::new("wide", ConsumerConfig::new("capture"), wide.clone()))
            .unwrap();

        let data = json!({"metrics": {"cpu": 1}, "logs": ["l"]});
        let event = Event::new("t", data.clone()).with_destinations(["narrow", "wide"]);
        Forwarder::forward(&registry.snapshot(), event).await;

        assert_eq!(narrow.seen()[0].data, json!({"metrics": {"cpu": 1}}));
        assert_eq!(wide.seen()[0].data, data);
    }

    // ==========================================================================
    // Failure containment
    // ==========================================================================

    #[tokio::test]
    async fn failing_and_panicking_consumers_do_not_stop_others() {
        let healthy = Arc::new(Capture::default());
        let registry = ConsumerRegistry::new();
        registry
            .register(ConsumerRecord::new("failing", ConsumerConfig::new("x"), Arc::new(Failing)))
            .unwrap();
        registry
            .register(ConsumerRecord::new("panicking", ConsumerConfig::new("x"), Arc::new(Panicking)))
            .unwrap();
        registry
            .register(ConsumerRecord::new("healthy", ConsumerConfig::new("x"), healthy.clone()))
            .unwrap();

        let event = Event::new("t", json!({"k": 1})).with_destinations(["failing", "panicking", "healthy"]);
        let report = Forwarder::forward(&registry.snapshot(), event).await;

        assert_eq!(report.matched, 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].0, "failing");
        assert!(report.failed[0].1.contains("downstream closed"));
        assert_eq!(report.failed[1], ("panicking".to_string(), "panicked: boom".to_string()));
        assert_eq!(healthy.seen().len(), 1);
    }

    #[tokio::test]
    async fn failed_action_still_delivers() {
        let capture = Arc::new(Capture::default());
        let registry = ConsumerRegistry::new();
        registry
            .register(ConsumerRecord::new(
                "c",
                config_with(json!([
                    {"JMESPath": {}, "expression": "length(name)"},
                    {"setTag": {"ok": true}}
                ])),
                capture.clone(),
            ))
            .unwrap();

        let event = Event::new("t", json!({"name": 5})).with_destinations(["c"]);
        let report = Forwarder::forward(&registry.snapshot(), event).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.actions_failed, 1);
        assert!(!report.is_clean());
        assert_eq!(capture.seen()[0].data, json!({"name": 5, "ok": true}));
    }

    // ==========================================================================
    // Tracing
    // ==========================================================================

    #[tokio::test]
    async fn tracer_receives_post_action_snapshot() {
        let tracer = Arc::new(MemoryTracer::default());
        let mut config = config_with(json!([{"setTag": {"password": "p"}}]));
        config.trace_name = "audit".to_string();
        let registry = ConsumerRegistry::new();
        registry
            .register(
                ConsumerRecord::new("c", config, Arc::new(Capture::default())).with_tracer(tracer.clone()),
            )
            .unwrap();

        let event = Event::new("status", json!({"v": 1})).with_destinations(["c"]);
        Forwarder::forward(&registry.snapshot(), event).await;

        assert_eq!(
            tracer.records(),
            vec![json!({
                "consumer": "audit",
                "type": "status",
                "data": {"v": 1, "password": crate::tracer::MASK}
            })]
        );
    }
}
