//! telemux - event transformation and multi-consumer delivery
//!
//! Every event names the consumers it is meant for. Each of them gets a
//! private copy of the data, narrowed by its data filter and reshaped by its
//! declared actions, before its delivery runs.
//!
//! ```text
//!                          ┌─► DataFilter ─► actions ─► Consumer (stdout)
//! EventSender ─► Runner ─► Forwarder
//!                          └─► DataFilter ─► actions ─► Consumer (Generic_HTTP) ─► host-fallback transport
//! ```
//!
//! Consumers are declared in a [`PipelineConfig`] and held by a
//! [`ConsumerRegistry`]; the forwarder reads the registry through a snapshot
//! taken once per event.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod actions;
pub mod config;
pub mod consumer;
pub mod error;
pub mod filter;
pub mod forwarder;
pub mod metrics;
pub mod registry;
pub mod runner;
pub mod tracer;
pub mod transport;

pub use actions::{ActionFailure, ActionReport, process_actions};
pub use config::{Config, ConsumerDeclaration, LogFormat, PipelineConfig, TraceSetting};
pub use consumer::{GenericHttpConsumer, StdoutConsumer, build_consumer};
pub use error::{GatewayError, Result};
pub use filter::DataFilter;
pub use forwarder::{ForwardReport, Forwarder};
pub use metrics::Metrics;
pub use registry::{ConsumerRecord, ConsumerRegistry, RegistrySnapshot};
pub use runner::{EventSender, ForwarderRunner, Pipeline};
pub use tracer::{FileTracer, MemoryTracer};
pub use transport::{HttpRequest, HttpResponse, HttpSend, ReqwestSender, TransportError};

pub use telemux_core::{Consumer, ConsumerConfig, ConsumerError, Context, ContextEvent, Event, Tracer};
