//! telemux-core - Core types for the telemux telemetry pipeline
//!
//! This crate provides the types shared between the telemux gateway and
//! external consumer implementations:
//!
//! - [`Event`] / [`ContextEvent`] - the pipeline envelope and its per-consumer copy
//! - [`Consumer`] trait - async interface for delivering events downstream
//! - [`Tracer`] trait - debug snapshot sink
//! - [`ConsumerError`] / [`ConfigError`] - error types
//! - [`query`] - the expression language used by `setTag` and `JMESPath` actions
//! - [`location`] and [`matcher`] - structural specs over documents
//! - [`action`] - declarative action specs, resolved at configuration load
//!
//! # Why this crate exists
//!
//! Consumer implementations only need the consumer contract and the event
//! model. Keeping those here lets a consumer crate avoid depending on the
//! gateway, while the gateway stays free to depend on consumer crates:
//!
//! ```text
//! telemux-core ◄── telemux-gateway
//!     ▲
//!     └────────── third-party consumers
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod action;
pub mod config;
mod consumer;
pub mod document;
mod error;
mod event;
pub mod keys;
pub mod location;
pub mod matcher;
pub mod query;

pub use action::{ActionKind, ActionSpec, TagSet, TagValue};
pub use config::ConsumerConfig;
pub use consumer::{Consumer, Context, Tracer};
pub use document::Document;
pub use error::{ConfigError, ConsumerError};
pub use event::{ContextEvent, Event};
pub use location::{LocationNode, LocationSpec};
pub use matcher::{Condition, MatcherSpec};
pub use query::{Expression, ExpressionError};
