//! Reference consumers
//!
//! | type           | implementation          |
//! |----------------|-------------------------|
//! | `default`      | [`StdoutConsumer`]      |
//! | `Generic_HTTP` | [`GenericHttpConsumer`] |

pub mod generic_http;
pub mod stdout;

pub use generic_http::{GenericHttpConsumer, GenericHttpSettings};
pub use stdout::StdoutConsumer;

use crate::error::{GatewayError, Result};
use std::sync::Arc;
use telemux_core::{Consumer, ConsumerConfig};

/// Type name of the stdout consumer
pub const DEFAULT_TYPE: &str = "default";
/// Type name of the generic HTTP consumer
pub const GENERIC_HTTP_TYPE: &str = "Generic_HTTP";

/// Instantiate the consumer implementation named by `config.consumer_type`
pub fn build_consumer(id: &str, config: &ConsumerConfig) -> Result<Arc<dyn Consumer>> {
    let init_error = |source| GatewayError::Consumer {
        id: id.to_string(),
        source,
    };
    match config.consumer_type.as_str() {
        DEFAULT_TYPE => Ok(Arc::new(StdoutConsumer::from_config(config))),
        GENERIC_HTTP_TYPE => Ok(Arc::new(
            GenericHttpConsumer::from_config(config).map_err(init_error)?,
        )),
        other => Err(GatewayError::UnknownConsumerType(other.to_string())),
    }
}
