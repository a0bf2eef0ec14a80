//! Generic HTTP consumer
//!
//! Posts the processed event data as JSON to `host`, falling back to
//! `fallbackHosts` in order when a host is unreachable or answers 5xx.
//!
//! ```json
//! {
//!   "type": "Generic_HTTP",
//!   "host": "collector.example.com",
//!   "fallbackHosts": ["collector-2.example.com"],
//!   "port": 8443,
//!   "path": "/ingest",
//!   "headers": [{"name": "Content-Type", "value": "application/json"}],
//!   "username": "telemetry",
//!   "passphrase": "secret"
//! }
//! ```
//!
//! With `username`, the credentials are sent as HTTP Basic auth. Without
//! it, `passphrase` is sent as the `Authorization` value unchanged, which
//! covers bearer tokens. A declared `Authorization` header wins over both.

use crate::transport::{
    self, HttpRequest, HttpSend, ProxyConfig, ReqwestSender, TransportError, TransportSettings,
    normalize_headers,
};
use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use telemux_core::{Consumer, ConsumerConfig, ConsumerError, Context};
use tracing::debug;

const AUTHORIZATION: &str = "Authorization";
const CONTENT_TYPE: &str = "Content-Type";

/// Declared settings of a `Generic_HTTP` consumer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericHttpSettings {
    pub host: String,
    #[serde(default)]
    pub fallback_hosts: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub port: Option<u16>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// `[{name, value}]`
    #[serde(default)]
    pub headers: Value,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub allow_self_signed_cert: bool,
    pub username: Option<String>,
    pub passphrase: Option<String>,
}

fn default_protocol() -> String {
    "https".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_method() -> String {
    "POST".to_string()
}

impl GenericHttpSettings {
    pub fn from_config(config: &ConsumerConfig) -> Result<Self, ConsumerError> {
        serde_json::from_value(Value::Object(config.settings.clone()))
            .map_err(|e| ConsumerError::Init(format!("Generic_HTTP settings: {e}")))
    }

    /// Primary host first, then fallbacks
    pub fn hosts(&self) -> Vec<String> {
        std::iter::once(self.host.clone())
            .chain(self.fallback_hosts.iter().cloned())
            .collect()
    }

    pub fn transport(&self) -> TransportSettings {
        TransportSettings {
            proxy: self.proxy.clone(),
            allow_self_signed_cert: self.allow_self_signed_cert,
            ..TransportSettings::default()
        }
    }

    /// `Authorization` value derived from the credentials, if any
    fn authorization(&self) -> Option<String> {
        match (&self.username, &self.passphrase) {
            (Some(user), passphrase) => {
                let credentials = format!("{user}:{}", passphrase.as_deref().unwrap_or_default());
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
                Some(format!("Basic {encoded}"))
            }
            (None, Some(passphrase)) => Some(passphrase.clone()),
            (None, None) => None,
        }
    }

    /// Request template; the body is filled in per event
    fn request(&self) -> HttpRequest {
        let mut headers = normalize_headers(&self.headers);
        if !headers.keys().any(|k| k.eq_ignore_ascii_case(AUTHORIZATION)) {
            if let Some(value) = self.authorization() {
                headers.insert(AUTHORIZATION.to_string(), value);
            }
        }
        if !headers.keys().any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE)) {
            headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
        }
        HttpRequest {
            protocol: self.protocol.clone(),
            port: self.port,
            path: self.path.clone(),
            method: self.method.clone(),
            headers,
            ..HttpRequest::default()
        }
    }
}

/// Generic HTTP consumer - registered as type `Generic_HTTP`
pub struct GenericHttpConsumer {
    hosts: Vec<String>,
    request: HttpRequest,
    sender: Arc<dyn HttpSend>,
}

impl GenericHttpConsumer {
    /// Build with a reqwest client configured from the settings
    pub fn from_config(config: &ConsumerConfig) -> Result<Self, ConsumerError> {
        let settings = GenericHttpSettings::from_config(config)?;
        let sender = ReqwestSender::new(&settings.transport())
            .map_err(|e| ConsumerError::Init(e.to_string()))?;
        Ok(Self::with_sender(&settings, Arc::new(sender)))
    }

    /// Build with a caller-supplied sender
    pub fn with_sender(settings: &GenericHttpSettings, sender: Arc<dyn HttpSend>) -> Self {
        Self {
            hosts: settings.hosts(),
            request: settings.request(),
            sender,
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

#[async_trait]
impl Consumer for GenericHttpConsumer {
    fn name(&self) -> &str {
        "Generic_HTTP"
    }

    async fn deliver(&self, ctx: Context) -> Result<(), ConsumerError> {
        let body = serde_json::to_vec(&ctx.event.data).map_err(|e| ConsumerError::Transform(e.to_string()))?;
        let request = HttpRequest {
            body: Some(Bytes::from(body)),
            ..self.request.clone()
        };

        if ctx.tracer.is_some() {
            ctx.trace(json!({
                "consumer": ctx.trace_name(),
                "hosts": self.hosts,
                "method": request.method,
                "path": request.path,
                "headers": request.headers,
                "body": ctx.event.data,
            }))
            .await;
        }

        let response = transport::deliver(self.sender.as_ref(), &self.hosts, &request)
            .await
            .map_err(|e| match e {
                TransportError::Connection { .. } => ConsumerError::Connection(e.to_string()),
                other => ConsumerError::Send(other.to_string()),
            })?;

        if !response.is_success() {
            return Err(ConsumerError::Status {
                code: response.status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        debug!(status = response.status, "Generic_HTTP delivered");
        Ok(())
    }
}
