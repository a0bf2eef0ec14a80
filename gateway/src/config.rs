//! Process and pipeline configuration
//!
//! Two layers:
//!
//! - [`Config`]: process settings from `TELEMUX_*` environment variables
//! - [`PipelineConfig`]: the declared consumers, loaded from a JSON file
//!
//! ```json
//! {
//!   "consumers": [
//!     {
//!       "id": "collector",
//!       "type": "Generic_HTTP",
//!       "host": "collector.example.com",
//!       "allowCategories": ["system", "virtualServers"],
//!       "trace": "/var/log/telemux/collector.json",
//!       "actions": [{"setTag": {"tenant": "`T`"}, "locations": {"virtualServers": {".*": true}}}]
//!     }
//!   ]
//! }
//! ```

use crate::consumer::build_consumer;
use crate::error::{GatewayError, Result};
use crate::filter::DataFilter;
use crate::registry::{ConsumerRecord, ConsumerRegistry};
use crate::runner::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_IN_FLIGHT};
use crate::tracer::{DEFAULT_CAPACITY, FileTracer, MemoryTracer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use telemux_core::{ConsumerConfig, Tracer};
use tracing::info;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `TELEMUX_LOG_LEVEL`, an `EnvFilter` directive
    pub log_level: String,
    /// `TELEMUX_LOG_FORMAT`
    pub log_format: LogFormat,
    /// `TELEMUX_CONFIG`, pipeline declaration file
    pub pipeline_path: Option<PathBuf>,
    /// `TELEMUX_CHANNEL_CAPACITY`
    pub channel_capacity: usize,
    /// `TELEMUX_MAX_IN_FLIGHT`, events forwarded concurrently
    pub max_in_flight: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            pipeline_path: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let invalid = |name: &str, value: &str| GatewayError::InvalidSetting {
            name: name.to_string(),
            value: value.to_string(),
        };

        let log_format = match lookup("TELEMUX_LOG_FORMAT") {
            Some(raw) => LogFormat::parse(&raw).ok_or_else(|| invalid("TELEMUX_LOG_FORMAT", &raw))?,
            None => defaults.log_format,
        };

        let positive = |name: &str, default: usize| -> Result<usize> {
            match lookup(name) {
                Some(raw) => match raw.trim().parse::<usize>() {
                    Ok(n) if n > 0 => Ok(n),
                    _ => Err(invalid(name, &raw)),
                },
                None => Ok(default),
            }
        };
        let channel_capacity = positive("TELEMUX_CHANNEL_CAPACITY", defaults.channel_capacity)?;
        let max_in_flight = positive("TELEMUX_MAX_IN_FLIGHT", defaults.max_in_flight)?;

        Ok(Self {
            log_level: lookup("TELEMUX_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            pipeline_path: lookup("TELEMUX_CONFIG")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            channel_capacity,
            max_in_flight,
        })
    }
}

/// Where a consumer's tracer writes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TraceSetting {
    /// `true` keeps traces in memory; `false` disables tracing
    Enabled(bool),
    /// Mirror traces to this file
    File(PathBuf),
}

impl Default for TraceSetting {
    fn default() -> Self {
        TraceSetting::Enabled(false)
    }
}

impl TraceSetting {
    fn build(&self) -> Option<Arc<dyn Tracer>> {
        match self {
            TraceSetting::Enabled(false) => None,
            TraceSetting::Enabled(true) => Some(Arc::new(MemoryTracer::new(DEFAULT_CAPACITY))),
            TraceSetting::File(path) => Some(Arc::new(FileTracer::new(path.clone(), DEFAULT_CAPACITY))),
        }
    }
}

/// One declared consumer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerDeclaration {
    pub id: String,
    /// Top-level data keys this consumer may see; absent means all
    #[serde(default)]
    pub allow_categories: Option<Vec<String>>,
    #[serde(default)]
    pub trace: TraceSetting,
    /// Passed through to every delivery context
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub config: ConsumerConfig,
}

impl ConsumerDeclaration {
    /// Build the registry record, instantiating the consumer implementation
    pub fn into_record(self) -> Result<ConsumerRecord> {
        let mut config = self.config;
        if config.trace_name.is_empty() {
            config.trace_name = self.id.clone();
        }

        let consumer = build_consumer(&self.id, &config)?;
        let filter = match self.allow_categories {
            Some(categories) => DataFilter::allow(categories),
            None => DataFilter::open(),
        };

        let mut record = ConsumerRecord::new(self.id, config, consumer)
            .with_filter(filter)
            .with_metadata(self.metadata);
        if let Some(tracer) = self.trace.build() {
            record = record.with_tracer(tracer);
        }
        Ok(record)
    }
}

/// Declared pipeline
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub consumers: Vec<ConsumerDeclaration>,
}

impl PipelineConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Instantiate every declared consumer
    pub fn into_records(self) -> Result<Vec<ConsumerRecord>> {
        self.consumers
            .into_iter()
            .map(ConsumerDeclaration::into_record)
            .collect()
    }

    /// Build a registry holding every declared consumer
    pub fn build_registry(self) -> Result<ConsumerRegistry> {
        let registry = ConsumerRegistry::new();
        for record in self.into_records()? {
            registry.register(record)?;
        }
        info!(consumers = registry.len(), "Pipeline configured");
        Ok(registry)
    }
}
