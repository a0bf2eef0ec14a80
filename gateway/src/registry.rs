//! Consumer registry
//!
//! Holds the configured consumers. The forwarder never reads the registry
//! directly; it works from a [`RegistrySnapshot`] taken once per event, so
//! a configuration reload swapping the consumer set never affects an event
//! already in flight.
//!
//! # Invariants
//!
//! - Consumer ids are unique
//! - Order is preserved (first registered = first in list)
//! - A snapshot never changes after it is taken

use crate::error::{GatewayError, Result};
use crate::filter::DataFilter;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use telemux_core::{Consumer, ConsumerConfig, Tracer};
use tracing::{error, info};

/// A registered consumer and everything needed to dispatch to it
pub struct ConsumerRecord {
    pub id: String,
    pub config: Arc<ConsumerConfig>,
    pub filter: DataFilter,
    pub consumer: Arc<dyn Consumer>,
    pub tracer: Option<Arc<dyn Tracer>>,
    pub metadata: Arc<Map<String, Value>>,
}

impl ConsumerRecord {
    pub fn new(id: impl Into<String>, config: ConsumerConfig, consumer: Arc<dyn Consumer>) -> Self {
        Self {
            id: id.into(),
            config: Arc::new(config),
            filter: DataFilter::open(),
            consumer,
            tracer: None,
            metadata: Arc::new(Map::new()),
        }
    }

    pub fn with_filter(mut self, filter: DataFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Arc::new(metadata);
        self
    }
}

/// Read-only view of the registry at one point in time
pub type RegistrySnapshot = Arc<Vec<Arc<ConsumerRecord>>>;

/// Registry for consumers
///
/// Thread-safe. Typically populated at startup, replaced wholesale on
/// configuration reload, and otherwise only read through snapshots.
///
/// # Example
///
/// ```ignore
/// use telemux_gateway::registry::{ConsumerRecord, ConsumerRegistry};
///
/// let registry = ConsumerRegistry::new();
/// registry.register(ConsumerRecord::new("out", config, Arc::new(StdoutConsumer::new())))?;
/// ```
pub struct ConsumerRegistry {
    records: RwLock<RegistrySnapshot>,
}

impl ConsumerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Add a consumer; fails if the id is taken
    pub fn register(&self, record: ConsumerRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(GatewayError::DuplicateConsumer(record.id));
        }
        info!(
            consumer = %record.id,
            kind = record.consumer.name(),
            "Registered consumer"
        );
        let mut next = records.as_ref().clone();
        next.push(Arc::new(record));
        *records = Arc::new(next);
        Ok(())
    }

    /// Swap the whole consumer set at once
    ///
    /// Returns the previous set so the caller can shut it down.
    pub fn replace_all(&self, records: Vec<ConsumerRecord>) -> Result<RegistrySnapshot> {
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(GatewayError::DuplicateConsumer(record.id.clone()));
            }
        }
        let next: Vec<_> = records.into_iter().map(Arc::new).collect();
        info!(count = next.len(), "Replaced consumer set");
        Ok(std::mem::replace(&mut *self.records.write(), Arc::new(next)))
    }

    /// Current consumer set
    pub fn snapshot(&self) -> RegistrySnapshot {
        Arc::clone(&self.records.read())
    }

    /// Find a consumer by id
    pub fn by_id(&self, id: &str) -> Option<Arc<ConsumerRecord>> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Graceful shutdown of all consumers
    ///
    /// Failures are logged; every consumer gets its shutdown call.
    pub async fn shutdown(&self) {
        shutdown_all(&self.snapshot()).await;
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shut down every consumer of a snapshot, logging failures
pub async fn shutdown_all(records: &[Arc<ConsumerRecord>]) {
    info!("Shutting down {} consumers", records.len());
    for record in records {
        if let Err(e) = record.consumer.shutdown().await {
            error!(consumer = %record.id, error = %e, "Error during consumer shutdown");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use telemux_core::{ConsumerError, Context};

    // ==========================================================================
    // Mock Consumer for testing
    // ==========================================================================

    struct MockConsumer {
        shutdown_called: AtomicBool,
        fail_shutdown: bool,
    }

    impl MockConsumer {
        fn new() -> Self {
            Self {
                shutdown_called: AtomicBool::new(false),
                fail_shutdown: false,
            }
        }

        fn failing_shutdown() -> Self {
            Self {
                shutdown_called: AtomicBool::new(false),
                fail_shutdown: true,
            }
        }

        fn was_shutdown(&self) -> bool {
            self.shutdown_called.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Consumer for MockConsumer {
        fn name(&self) -> &str {
            "mock"
        }

        async fn deliver(&self, _ctx: Context) -> std::result::Result<(), ConsumerError> {
            Ok(())
        }

        async fn shutdown(&self) -> std::result::Result<(), ConsumerError> {
            self.shutdown_called.store(true, Ordering::SeqCst);
            if self.fail_shutdown {
                Err(ConsumerError::Shutdown("flush failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn record(id: &str, consumer: Arc<MockConsumer>) -> ConsumerRecord {
        ConsumerRecord::new(id, ConsumerConfig::new("mock"), consumer)
    }

    // ==========================================================================
    // Registration tests
    // ==========================================================================

    #[test]
    fn new_registry_is_empty() {
        let registry = ConsumerRegistry::new();
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn register_preserves_order() {
        let registry = ConsumerRegistry::new();
        registry.register(record("first", Arc::new(MockConsumer::new()))).unwrap();
        registry.register(record("second", Arc::new(MockConsumer::new()))).unwrap();

        let ids: Vec<_> = registry.snapshot().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let registry = ConsumerRegistry::new();
        registry.register(record("dup", Arc::new(MockConsumer::new()))).unwrap();
        let err = registry
            .register(record("dup", Arc::new(MockConsumer::new())))
            .unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateConsumer(id) if id == "dup"));
        assert_eq!(registry.len(), 1);
    }

    // ==========================================================================
    // Lookup tests
    // ==========================================================================

    #[test]
    fn by_id_returns_matching_record() {
        let registry = ConsumerRegistry::new();
        registry.register(record("kafka", Arc::new(MockConsumer::new()))).unwrap();

        assert_eq!(registry.by_id("kafka").unwrap().id, "kafka");
        assert!(registry.by_id("unknown").is_none());
    }

    // ==========================================================================
    // Snapshot tests
    // ==========================================================================

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let registry = ConsumerRegistry::new();
        registry.register(record("a", Arc::new(MockConsumer::new()))).unwrap();
        let before = registry.snapshot();

        registry.register(record("b", Arc::new(MockConsumer::new()))).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn replace_all_swaps_and_returns_previous() {
        let registry = ConsumerRegistry::new();
        registry.register(record("old", Arc::new(MockConsumer::new()))).unwrap();

        let previous = registry
            .replace_all(vec![
                record("new1", Arc::new(MockConsumer::new())),
                record("new2", Arc::new(MockConsumer::new())),
            ])
            .unwrap();

        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].id, "old");
        assert_eq!(registry.len(), 2);
        assert!(registry.by_id("old").is_none());
    }

    #[test]
    fn replace_all_rejects_duplicates_without_swapping() {
        let registry = ConsumerRegistry::new();
        registry.register(record("keep", Arc::new(MockConsumer::new()))).unwrap();

        let result = registry.replace_all(vec![
            record("x", Arc::new(MockConsumer::new())),
            record("x", Arc::new(MockConsumer::new())),
        ]);
        assert!(result.is_err());
        assert!(registry.by_id("keep").is_some());
    }

    // ==========================================================================
    // Shutdown tests
    // ==========================================================================

    #[tokio::test]
    async fn shutdown_reaches_every_consumer_even_after_failure() {
        let failing = Arc::new(MockConsumer::failing_shutdown());
        let healthy = Arc::new(MockConsumer::new());

        let registry = ConsumerRegistry::new();
        registry.register(record("failing", failing.clone())).unwrap();
        registry.register(record("healthy", healthy.clone())).unwrap();

        registry.shutdown().await;

        assert!(failing.was_shutdown());
        assert!(healthy.was_shutdown());
    }
}
