//! Stdout consumer for debugging
//!
//! Prints each delivered event as one JSON line, or as a framed pretty
//! block when `pretty` is set.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use telemux_core::{Consumer, ConsumerConfig, ConsumerError, Context};

/// Stdout consumer - registered as type `default`
pub struct StdoutConsumer {
    pretty: bool,
    /// Stdout unless a writer was injected
    out: Option<Mutex<Box<dyn Write + Send>>>,
    delivered_count: AtomicU64,
}

impl StdoutConsumer {
    pub fn new() -> Self {
        Self {
            pretty: false,
            out: None,
            delivered_count: AtomicU64::new(0),
        }
    }

    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::new()
        }
    }

    /// Build from declared settings (`pretty: bool`)
    pub fn from_config(config: &ConsumerConfig) -> Self {
        if config.setting_bool("pretty").unwrap_or(false) {
            Self::pretty()
        } else {
            Self::new()
        }
    }

    /// Write somewhere other than stdout
    pub fn with_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.out = Some(Mutex::new(writer));
        self
    }

    /// Events successfully written
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    fn render(&self, ctx: &Context) -> Result<String, ConsumerError> {
        let line = json!({
            "consumer": ctx.consumer_id,
            "type": ctx.event.event_type,
            "data": ctx.event.data,
        });
        if !self.pretty {
            return serde_json::to_string(&line).map_err(|e| ConsumerError::Transform(e.to_string()));
        }

        let body = serde_json::to_string_pretty(&ctx.event.data)
            .map_err(|e| ConsumerError::Transform(e.to_string()))?;
        let mut block = String::new();
        block.push_str("┌─ Event ─────────────────────────────────────────────\n");
        block.push_str(&format!("│ Consumer:  {}\n", ctx.consumer_id));
        block.push_str(&format!("│ Type:      {}\n", ctx.event.event_type));
        for line in body.lines() {
            block.push_str(&format!("│ {line}\n"));
        }
        block.push_str("└─────────────────────────────────────────────────────");
        Ok(block)
    }
}

impl Default for StdoutConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Consumer for StdoutConsumer {
    fn name(&self) -> &str {
        "default"
    }

    async fn deliver(&self, ctx: Context) -> Result<(), ConsumerError> {
        let text = self.render(&ctx)?;
        let result = match &self.out {
            Some(out) => writeln!(out.lock(), "{text}"),
            None => writeln!(std::io::stdout().lock(), "{text}"),
        };
        result.map_err(|e| ConsumerError::Send(format!("stdout write failed: {e}")))?;
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ConsumerError> {
        let result = match &self.out {
            Some(out) => out.lock().flush(),
            None => std::io::stdout().lock().flush(),
        };
        result.map_err(|e| ConsumerError::Shutdown(e.to_string()))
    }
}
