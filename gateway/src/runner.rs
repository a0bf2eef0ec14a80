//! Pipeline runner - feeds events from a channel into the forwarder
//!
//! ```text
//! EventSender ──► mpsc (bounded) ──► ForwarderRunner ──► task per event ──► Forwarder::forward
//!                                          │
//!                                          └─► fresh registry snapshot per event
//! ```
//!
//! Events are forwarded concurrently, at most `max_in_flight` at a time, so
//! a consumer stuck on one event does not hold back later events for the
//! other consumers. Delivery order across events is not preserved.
//!
//! # Example
//!
//! ```ignore
//! use telemux_gateway::{ConsumerRegistry, Pipeline};
//!
//! let (sender, runner) = Pipeline::new(registry)
//!     .channel_capacity(256)
//!     .max_in_flight(64)
//!     .build();
//! tokio::spawn(runner.run());
//! sender.send(event).await?;
//! ```

use crate::error::{GatewayError, Result};
use crate::forwarder::{ForwardReport, Forwarder};
use crate::metrics::Metrics;
use crate::registry::ConsumerRegistry;
use std::sync::Arc;
use telemux_core::Event;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

/// Default event channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default number of events forwarded at once
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Upper bound accepted for `max_in_flight`
pub const MAX_IN_FLIGHT_LIMIT: u32 = 65_536;

/// Pipeline builder
pub struct Pipeline {
    registry: Arc<ConsumerRegistry>,
    /// Events queued before `send` starts waiting
    channel_capacity: usize,
    max_in_flight: u32,
}

impl Pipeline {
    pub fn new(registry: Arc<ConsumerRegistry>) -> Self {
        Self {
            registry,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT as u32,
        }
    }

    /// Set the input channel capacity
    ///
    /// Default is 1,024 events. Zero is raised to one.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set how many events may be forwarded concurrently
    ///
    /// Default is 256. Values are clamped to `1..=MAX_IN_FLIGHT_LIMIT`.
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = u32::try_from(limit)
            .unwrap_or(MAX_IN_FLIGHT_LIMIT)
            .clamp(1, MAX_IN_FLIGHT_LIMIT);
        self
    }

    /// Build the sender/runner pair
    pub fn build(self) -> (EventSender, ForwarderRunner) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let runner = ForwarderRunner {
            rx,
            registry: self.registry,
            max_in_flight: self.max_in_flight,
        };
        (EventSender { tx }, runner)
    }
}

/// Handle for injecting events into the pipeline
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// Send an event, waiting for channel space
    pub async fn send(&self, event: Event) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|e| GatewayError::Channel(e.to_string()))
    }

    /// Send without waiting; fails when the channel is full or closed
    pub fn try_send(&self, event: Event) -> Result<()> {
        self.tx
            .try_send(event)
            .map_err(|e| GatewayError::Channel(e.to_string()))
    }
}

/// Processes events until every [`EventSender`] is dropped
pub struct ForwarderRunner {
    rx: mpsc::Receiver<Event>,
    registry: Arc<ConsumerRegistry>,
    max_in_flight: u32,
}

impl ForwarderRunner {
    /// Run the forwarding loop
    ///
    /// Each event is forwarded on its own task against the registry as it
    /// is when the event is taken off the channel. When the channel closes,
    /// in-flight events are drained, every consumer is shut down and the run
    /// ends. Returns the number of events processed.
    pub async fn run(mut self) -> u64 {
        if let Err(e) = Metrics::init() {
            debug!(error = %e, "Metrics not initialized");
        }
        info!(consumers = self.registry.len(), "Forwarder started");
        if self.registry.is_empty() {
            warn!("No consumers registered - events will not be delivered");
        }

        let permits = Arc::new(Semaphore::new(self.max_in_flight as usize));
        let mut processed = 0u64;
        while let Some(event) = self.rx.recv().await {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(error = %e, "In-flight limiter closed, stopping");
                    break;
                }
            };
            let snapshot = self.registry.snapshot();
            tokio::spawn(async move {
                let report = Forwarder::forward(&snapshot, event).await;
                log_report(&report);
                drop(permit);
            });
            processed += 1;
        }

        // Every permit back means every forward task has finished
        if let Err(e) = permits.acquire_many(self.max_in_flight).await {
            warn!(error = %e, "Could not wait for in-flight events");
        }

        info!(processed, "Event channel closed, shutting down consumers");
        self.registry.shutdown().await;
        info!("Forwarder shutdown complete");
        processed
    }
}

fn log_report(report: &ForwardReport) {
    if report.failed.is_empty() {
        debug!(
            matched = report.matched,
            delivered = report.delivered,
            actions_failed = report.actions_failed,
            "Event forwarded"
        );
    } else {
        warn!(
            matched = report.matched,
            delivered = report.delivered,
            failed = ?report.failed,
            "Event forwarded with failures"
        );
    }
}
