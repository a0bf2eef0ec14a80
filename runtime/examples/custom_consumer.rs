//! Embedding telemux with a hand-written consumer.
//!
//! ```bash
//! cargo run -p telemux-runtime --example custom_consumer
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use telemux_runtime::prelude::*;

/// Counts the bytes of every document it receives
#[derive(Default)]
struct ByteCounter {
    bytes: AtomicU64,
}

#[async_trait::async_trait]
impl Consumer for ByteCounter {
    fn name(&self) -> &str {
        "byte-counter"
    }

    async fn deliver(&self, ctx: Context) -> Result<(), ConsumerError> {
        let size = serde_json::to_vec(&ctx.event.data)
            .map_err(|e| ConsumerError::Transform(e.to_string()))?
            .len();
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let actions: Vec<ActionSpec> = serde_json::from_value(serde_json::json!([
        {"excludeData": {}, "locations": {"system": {"diskStorage": true}}}
    ]))?;

    let counter = Arc::new(ByteCounter::default());
    let registry = Arc::new(ConsumerRegistry::new());
    registry.register(ConsumerRecord::new(
        "bytes",
        ConsumerConfig::new("byte-counter").with_actions(actions),
        counter.clone(),
    ))?;
    registry.register(ConsumerRecord::new(
        "stdout",
        ConsumerConfig::new("default"),
        Arc::new(StdoutConsumer::pretty()),
    ))?;

    let (sender, runner) = Pipeline::new(registry).build();
    let handle = tokio::spawn(runner.run());

    sender
        .send(
            Event::new(
                "systemInfo",
                serde_json::json!({"system": {"hostname": "h", "diskStorage": {"/": {"size": 1}}}}),
            )
            .with_destinations(["bytes", "stdout"]),
        )
        .await?;
    drop(sender);
    handle.await?;

    println!("byte-counter saw {} bytes", counter.bytes.load(Ordering::Relaxed));
    Ok(())
}
