//! Forwarding integration tests
//!
//! Drives whole pipelines declared the way operators declare them (JSON)
//! and checks the delivery guarantees:
//! - events reach exactly the consumers they name
//! - one consumer's actions never show up in another consumer's data
//! - a failing consumer or action never blocks the rest

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use telemux_gateway::{
    Consumer, ConsumerConfig, ConsumerError, ConsumerRecord, ConsumerRegistry, Context, Event,
    Forwarder, MemoryTracer, Pipeline, PipelineConfig, Tracer,
};

// ============================================================================
// Shared test consumers
// ============================================================================

/// Consumer that keeps every delivered document
#[derive(Default)]
struct CaptureConsumer {
    captured: Mutex<Vec<Value>>,
}

impl CaptureConsumer {
    fn take_all(&self) -> Vec<Value> {
        self.captured.lock().clone()
    }
}

#[async_trait::async_trait]
impl Consumer for CaptureConsumer {
    fn name(&self) -> &str {
        "capture"
    }

    async fn deliver(&self, ctx: Context) -> Result<(), ConsumerError> {
        self.captured.lock().push(ctx.event.data);
        Ok(())
    }
}

/// Consumer that mutates its own copy in place and then fails
struct MutateThenFail;

#[async_trait::async_trait]
impl Consumer for MutateThenFail {
    fn name(&self) -> &str {
        "mutate-then-fail"
    }

    async fn deliver(&self, mut ctx: Context) -> Result<(), ConsumerError> {
        if let Value::Object(map) = &mut ctx.event.data {
            map.clear();
            map.insert("hijacked".to_string(), json!(true));
        }
        Err(ConsumerError::Connection("peer reset".to_string()))
    }
}

fn actions(specs: Value) -> ConsumerConfig {
    ConsumerConfig::new("capture").with_actions(serde_json::from_value(specs).unwrap())
}

fn sample_data() -> Value {
    json!({
        "system": {"hostname": "bigip1.example.com", "version": "17.1.0"},
        "virtualServers": {
            "/Common/app/vs1": {"clientside.bitsIn": 10, "enabledState": "enabled"},
            "/Common/app/vs2": {"clientside.bitsIn": 20, "enabledState": "disabled"}
        },
        "telemetryEventCategory": "systemInfo"
    })
}

// ============================================================================
// Resolution
// ============================================================================

#[tokio::test]
async fn zero_matching_consumers_completes_without_delivery() {
    let capture = Arc::new(CaptureConsumer::default());
    let registry = ConsumerRegistry::new();
    registry
        .register(ConsumerRecord::new("a", ConsumerConfig::new("capture"), capture.clone()))
        .unwrap();

    let event = Event::new("systemInfo", sample_data()).with_destinations(["nobody"]);
    let report = Forwarder::forward(&registry.snapshot(), event).await;

    assert_eq!(report.matched, 0);
    assert_eq!(report.delivered, 0);
    assert!(report.failed.is_empty());
    assert!(capture.take_all().is_empty());
}

#[tokio::test]
async fn event_without_destinations_reaches_nobody() {
    let capture = Arc::new(CaptureConsumer::default());
    let registry = ConsumerRegistry::new();
    registry
        .register(ConsumerRecord::new("a", ConsumerConfig::new("capture"), capture.clone()))
        .unwrap();

    let report = Forwarder::forward(&registry.snapshot(), Event::new("x", json!({}))).await;
    assert_eq!(report.delivered, 0);
    assert!(capture.take_all().is_empty());
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test]
async fn consumer_mutation_is_invisible_to_others() {
    let observer = Arc::new(CaptureConsumer::default());
    let registry = ConsumerRegistry::new();
    registry
        .register(ConsumerRecord::new(
            "mutator",
            actions(json!([
                {"setTag": {"owner": "mutator"}},
                {"includeData": {}, "locations": {"system": true}}
            ])),
            Arc::new(MutateThenFail),
        ))
        .unwrap();
    registry
        .register(ConsumerRecord::new("observer", ConsumerConfig::new("capture"), observer.clone()))
        .unwrap();

    let event = Event::new("systemInfo", sample_data()).with_destinations(["mutator", "observer"]);
    let report = Forwarder::forward(&registry.snapshot(), event).await;

    assert_eq!(report.matched, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "mutator");
    assert_eq!(observer.take_all(), vec![sample_data()]);
}

#[tokio::test]
async fn failing_action_expression_still_delivers() {
    let capture = Arc::new(CaptureConsumer::default());
    let registry = ConsumerRegistry::new();
    registry
        .register(ConsumerRecord::new(
            "c",
            actions(json!([
                {"setTag": {"bad": "${length(system.missing.deeper)}", "good": "yes"}},
                {"setTag": {"after": "ok"}}
            ])),
            capture.clone(),
        ))
        .unwrap();

    let event = Event::new("systemInfo", json!({"system": {"a": 1}})).with_destinations(["c"]);
    let report = Forwarder::forward(&registry.snapshot(), event).await;

    assert_eq!(report.delivered, 1);
    assert_eq!(report.actions_failed, 1);
    // setTag is atomic: the failing value keeps "good" out as well
    assert_eq!(capture.take_all(), vec![json!({"system": {"a": 1}, "after": "ok"})]);
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn set_tag_with_tenant_and_application_at_matching_locations() {
    let capture = Arc::new(CaptureConsumer::default());
    let registry = ConsumerRegistry::new();
    registry
        .register(ConsumerRecord::new(
            "tagged",
            actions(json!([{
                "setTag": {
                    "tenant": "`T`",
                    "application": "`A`",
                    "host": "${system.hostname}"
                },
                "locations": {"virtualServers": {".*": true}},
                "ifAllMatch": {"system": {"version": "17\\..*"}}
            }])),
            capture.clone(),
        ))
        .unwrap();

    let event = Event::new("systemInfo", sample_data()).with_destinations(["tagged"]);
    Forwarder::forward(&registry.snapshot(), event).await;

    let all = capture.take_all();
    let delivered = &all[0];
    assert_eq!(
        delivered["virtualServers"]["/Common/app/vs1"],
        json!({
            "clientside.bitsIn": 10,
            "enabledState": "enabled",
            "tenant": "Common",
            "application": "app",
            "host": "bigip1.example.com"
        })
    );
    assert_eq!(delivered["virtualServers"]["/Common/app/vs2"]["tenant"], json!("Common"));
    assert_eq!(delivered["system"], sample_data()["system"]);
}

#[tokio::test]
async fn declared_pipeline_runs_through_the_runner() {
    let pipeline = PipelineConfig::from_json(
        r#"{"consumers": [{
            "id": "stdout",
            "type": "default",
            "trace": true,
            "allowCategories": ["system"],
            "actions": [{"setTag": {"pipeline": "telemux"}}]
        }]}"#,
    )
    .unwrap();
    let registry = Arc::new(pipeline.build_registry().unwrap());

    let (sender, runner) = Pipeline::new(Arc::clone(&registry)).channel_capacity(4).build();
    let handle = tokio::spawn(runner.run());

    sender
        .send(Event::new("systemInfo", sample_data()).with_destinations(["stdout"]))
        .await
        .unwrap();
    drop(sender);
    assert_eq!(handle.await.unwrap(), 1);
}

#[tokio::test]
async fn declared_filter_actions_and_tracer_compose() {
    let declared = PipelineConfig::from_json(
        r#"{"consumers": [{
            "id": "narrow",
            "type": "default",
            "allowCategories": ["system"],
            "actions": [{"setTag": {"pipeline": "telemux"}}]
        }]}"#,
    )
    .unwrap()
    .build_registry()
    .unwrap()
    .by_id("narrow")
    .unwrap();

    // Same declaration, observable consumer and tracer
    let capture = Arc::new(CaptureConsumer::default());
    let memory = Arc::new(MemoryTracer::default());
    let registry = ConsumerRegistry::new();
    registry
        .register(
            ConsumerRecord::new("narrow", (*declared.config).clone(), capture.clone())
                .with_filter(declared.filter.clone())
                .with_tracer(memory.clone() as Arc<dyn Tracer>),
        )
        .unwrap();

    let event = Event::new("systemInfo", sample_data()).with_destinations(["narrow"]);
    Forwarder::forward(&registry.snapshot(), event).await;

    let expected = json!({"system": sample_data()["system"], "pipeline": "telemux"});
    assert_eq!(capture.take_all(), vec![expected.clone()]);
    assert_eq!(
        memory.records(),
        vec![json!({"consumer": "narrow", "type": "systemInfo", "data": expected})]
    );
}
