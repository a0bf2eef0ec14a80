//! Error types for the telemux gateway

use thiserror::Error;

pub use telemux_core::{ConfigError, ConsumerError};

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
///
/// Covers setup and configuration. Nothing raised while delivering to one
/// consumer is ever converted into this type; per-consumer failures stay
/// inside the forward report.
///
/// Malformed actions, locations and matchers are rejected while the pipeline
/// JSON is deserialized, so they arrive as [`GatewayError::Json`] carrying the
/// [`ConfigError`] message.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON (config file or input event)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A consumer declaration names an implementation we do not ship
    #[error("unknown consumer type '{0}'")]
    UnknownConsumerType(String),

    /// Two consumers share an id
    #[error("consumer '{0}' is already registered")]
    DuplicateConsumer(String),

    /// A consumer could not be built from its settings
    #[error("consumer '{id}' error: {source}")]
    Consumer {
        id: String,
        #[source]
        source: ConsumerError,
    },

    /// An environment setting could not be parsed
    #[error("invalid value '{value}' for {name}")]
    InvalidSetting { name: String, value: String },

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// The event channel is full or the runner is gone
    #[error("event channel: {0}")]
    Channel(String),
}
