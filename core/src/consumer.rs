//! Consumer contract
//!
//! A [`Consumer`] receives one [`Context`] per event addressed to it. The
//! context is built by the forwarder and owned by the delivery call, so a
//! consumer may do whatever it wants with the data without affecting any
//! other consumer.

use crate::config::ConsumerConfig;
use crate::error::ConsumerError;
use crate::event::ContextEvent;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Consumer trait - delivers processed events to a downstream system
///
/// Each registered consumer handles one destination. The forwarder calls
/// `deliver` once per event, after the consumer's data filter and actions
/// have run.
///
/// # Implementation Requirements
///
/// - Consumers must be `Send + Sync`; deliveries for different events may
///   run concurrently
/// - `deliver` owns its context and may mutate it freely
/// - An error returned from `deliver` is logged and counted by the
///   forwarder; it never reaches other consumers
///
/// # Example
///
/// ```ignore
/// use telemux_core::{Consumer, ConsumerError, Context};
/// use async_trait::async_trait;
///
/// struct CountingConsumer(std::sync::atomic::AtomicU64);
///
/// #[async_trait]
/// impl Consumer for CountingConsumer {
///     fn name(&self) -> &str {
///         "counting"
///     }
///
///     async fn deliver(&self, ctx: Context) -> Result<(), ConsumerError> {
///         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Implementation name for logs, e.g. `Generic_HTTP`
    fn name(&self) -> &str;

    /// Deliver one processed event
    async fn deliver(&self, ctx: Context) -> Result<(), ConsumerError>;

    /// Graceful shutdown
    ///
    /// Called once when the pipeline stops. The default does nothing.
    async fn shutdown(&self) -> Result<(), ConsumerError> {
        Ok(())
    }
}

/// Debug sink for per-consumer snapshots
///
/// Implementations are expected to mask secrets before storing anything.
#[async_trait]
pub trait Tracer: Send + Sync {
    async fn write(&self, snapshot: Value);
}

/// Everything a consumer needs for one delivery
pub struct Context {
    pub consumer_id: String,
    pub event: ContextEvent,
    pub config: Arc<ConsumerConfig>,
    pub metadata: Arc<Map<String, Value>>,
    pub tracer: Option<Arc<dyn Tracer>>,
}

impl Context {
    /// Write to the consumer's tracer, if one is configured
    pub async fn trace(&self, snapshot: Value) {
        if let Some(tracer) = &self.tracer {
            tracer.write(snapshot).await;
        }
    }

    /// Trace name of the consumer, falling back to its id
    pub fn trace_name(&self) -> &str {
        if self.config.trace_name.is_empty() {
            &self.consumer_id
        } else {
            &self.config.trace_name
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("consumer_id", &self.consumer_id)
            .field("event", &self.event)
            .field("consumer_type", &self.config.consumer_type)
            .field("traced", &self.tracer.is_some())
            .finish_non_exhaustive()
    }
}
