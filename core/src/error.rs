//! Error types for telemux consumers and rule configuration

use thiserror::Error;

/// Error type for consumer operations
///
/// This is the standard error type returned by every consumer delivery
/// function. The forwarder catches it per consumer, so a failing consumer
/// never affects delivery to any other consumer.
///
/// # Example
///
/// ```
/// use telemux_core::ConsumerError;
///
/// fn post_to_backend() -> Result<(), ConsumerError> {
///     Err(ConsumerError::Connection("refused".to_string()))
/// }
///
/// match post_to_backend() {
///     Ok(_) => println!("Delivered"),
///     Err(ConsumerError::Connection(msg)) => println!("Connection failed: {}", msg),
///     Err(e) => println!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// Initialization failed
    ///
    /// Returned when a consumer cannot be built from its configuration.
    /// Examples: missing host, invalid proxy settings.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Transform failed
    ///
    /// Returned when the consumer cannot turn the event into its payload.
    #[error("transform failed: {0}")]
    Transform(String),

    /// Send failed
    ///
    /// Returned when no host accepted the request.
    #[error("send failed: {0}")]
    Send(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// The destination answered with a status the consumer treats as failure
    #[error("destination returned status {code}: {message}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Shutdown error
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Invalid declarative configuration
///
/// Raised while loading consumer configuration, before any event is
/// processed. Action, location, matcher and tag shapes are all validated at
/// this boundary so the action processor only ever sees well-formed specs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A location spec contains something other than `true`, `false` or an object
    #[error("invalid location at '{path}': {reason}")]
    InvalidLocation { path: String, reason: String },

    /// A matcher spec contains an array or is not an object
    #[error("invalid matcher at '{path}': {reason}")]
    InvalidMatcher { path: String, reason: String },

    /// An action has zero or several kinds, or conflicting options
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// A tag value cannot be used
    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    /// An expression failed to compile
    #[error("invalid expression '{expression}': {source}")]
    Expression {
        expression: String,
        #[source]
        source: crate::query::ExpressionError,
    },
}
