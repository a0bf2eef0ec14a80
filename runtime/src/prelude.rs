//! Convenience re-exports for pipeline authors.
//!
//! ```rust
//! use telemux_runtime::prelude::*;
//! ```

// Event model and consumer contract
pub use telemux_core::{
    ActionSpec, Consumer, ConsumerConfig, ConsumerError, Context, ContextEvent, Event, Tracer,
};

// Pipeline
pub use telemux_gateway::{
    ConsumerRecord, ConsumerRegistry, DataFilter, EventSender, ForwardReport, Forwarder,
    ForwarderRunner, Pipeline, PipelineConfig,
};

// Reference consumers and tracers
pub use telemux_gateway::{FileTracer, GenericHttpConsumer, MemoryTracer, StdoutConsumer};
