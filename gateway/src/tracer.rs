//! Consumer tracers
//!
//! Debug sinks that keep the last few snapshots a consumer produced. Every
//! snapshot is redacted before it is stored: values under secret-bearing
//! keys are replaced by [`MASK`] at any depth.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use telemux_core::Tracer;
use tracing::warn;

/// Replacement for secret values
pub const MASK: &str = "*********";

/// Default number of records kept per tracer
pub const DEFAULT_CAPACITY: usize = 10;

const SECRET_KEYS: [&str; 6] = [
    "passphrase",
    "password",
    "privatekey",
    "apikey",
    "authorization",
    "x-api-key",
];

fn is_secret(key: &str) -> bool {
    SECRET_KEYS.iter().any(|secret| key.eq_ignore_ascii_case(secret))
}

/// Copy of `value` with every secret masked
pub fn redact(value: &Value) -> Value {
    let mut copy = value.clone();
    redact_in_place(&mut copy);
    copy
}

fn redact_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if is_secret(key) && !child.is_null() {
                    *child = Value::String(MASK.to_string());
                } else {
                    redact_in_place(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_in_place),
        _ => {}
    }
}

/// Bounded ring of redacted snapshots
struct TraceRing {
    records: Mutex<VecDeque<Value>>,
    capacity: usize,
    total_written: AtomicU64,
    total_dropped: AtomicU64,
}

impl TraceRing {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            total_written: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    /// Store a snapshot, returning the ring contents afterwards
    fn push(&self, snapshot: Value) -> Vec<Value> {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }
        records.push_back(redact(&snapshot));
        self.total_written.fetch_add(1, Ordering::Relaxed);
        records.iter().cloned().collect()
    }

    fn records(&self) -> Vec<Value> {
        self.records.lock().iter().cloned().collect()
    }
}

/// In-memory tracer
pub struct MemoryTracer {
    ring: TraceRing,
}

impl MemoryTracer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: TraceRing::new(capacity),
        }
    }

    /// Stored snapshots, oldest first
    pub fn records(&self) -> Vec<Value> {
        self.ring.records()
    }

    pub fn len(&self) -> usize {
        self.ring.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.records.lock().is_empty()
    }

    /// Total snapshots ever written
    pub fn total_written(&self) -> u64 {
        self.ring.total_written.load(Ordering::Relaxed)
    }

    /// Snapshots evicted because the ring was full
    pub fn total_dropped(&self) -> u64 {
        self.ring.total_dropped.load(Ordering::Relaxed)
    }
}

impl Default for MemoryTracer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Tracer for MemoryTracer {
    async fn write(&self, snapshot: Value) {
        self.ring.push(snapshot);
    }
}

/// Tracer that mirrors its ring to a file as a pretty JSON array
pub struct FileTracer {
    path: PathBuf,
    ring: TraceRing,
    // Serializes file rewrites so a stale ring never overwrites a newer one
    file: tokio::sync::Mutex<()>,
}

impl FileTracer {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            ring: TraceRing::new(capacity),
            file: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, records: &[Value]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.path, body).await
    }
}

#[async_trait]
impl Tracer for FileTracer {
    async fn write(&self, snapshot: Value) {
        let _guard = self.file.lock().await;
        let records = self.ring.push(snapshot);
        if let Err(e) = self.flush(&records).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write trace file");
        }
    }
}
