//! Host-fallback delivery transport
//!
//! Network consumers describe one request and a list of hosts. [`deliver`]
//! tries the hosts in order and returns the first usable response:
//!
//! ```text
//! host[0] ──✗──► host[1] ──✗──► host[2] ──✓──► response
//!          conn error     5xx
//! ```
//!
//! A connection failure or a 5xx moves on to the next host. Anything below
//! 500 is returned as-is, unless the request opts out of tolerating client
//! errors, in which case a 4xx is returned immediately as an error.

pub mod headers;
mod http;

pub use headers::normalize_headers;
pub use http::ReqwestSender;

use crate::metrics;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Delivery failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The exchange did not complete (DNS, refused, TLS, timeout)
    #[error("request to {host} failed: {message}")]
    Connection { host: String, message: String },

    #[error("{host} returned server error {status}")]
    ServerStatus { host: String, status: u16 },

    #[error("{host} returned client error {status}")]
    ClientStatus { host: String, status: u16 },

    #[error("no hosts to deliver to")]
    NoHosts,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// One logical request, independent of the host it goes to
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// `http` or `https`
    pub protocol: String,
    /// Appended to every host when set; hosts may carry their own port otherwise
    pub port: Option<u16>,
    pub path: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    /// Treat 4xx as a normal response instead of an error
    pub continue_on_error_code: bool,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            port: None,
            path: "/".to_string(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            body: None,
            continue_on_error_code: true,
        }
    }
}

impl HttpRequest {
    /// Full URL for `host`
    pub fn url(&self, host: &str) -> String {
        let port = self.port.map(|p| format!(":{p}")).unwrap_or_default();
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{host}{port}{path}", self.protocol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Sends one request to one host
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, host: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Outbound proxy settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub host: String,
    pub port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub username: Option<String>,
    pub passphrase: Option<String>,
}

fn default_protocol() -> String {
    "https".to_string()
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{port}", self.protocol, self.host),
            None => format!("{}://{}", self.protocol, self.host),
        }
    }
}

/// Client-level settings shared by every request of a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub proxy: Option<ProxyConfig>,
    pub allow_self_signed_cert: bool,
    pub timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            proxy: None,
            allow_self_signed_cert: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Send `request` to each host in turn until one answers usefully
///
/// Returns the last error when every host fails, or
/// [`TransportError::NoHosts`] for an empty list.
pub async fn deliver(
    sender: &dyn HttpSend,
    hosts: &[String],
    request: &HttpRequest,
) -> Result<HttpResponse, TransportError> {
    let mut last_error = None;

    for (attempt, host) in hosts.iter().enumerate() {
        let error = match sender.send(host, request).await {
            Ok(response) if response.status >= 500 => TransportError::ServerStatus {
                host: host.clone(),
                status: response.status,
            },
            Ok(response) if !request.continue_on_error_code && response.is_client_error() => {
                return Err(TransportError::ClientStatus {
                    host: host.clone(),
                    status: response.status,
                });
            }
            Ok(response) => {
                if attempt > 0 {
                    debug!(host = %host, attempt, status = response.status, "Delivered after failover");
                }
                return Ok(response);
            }
            Err(e) => e,
        };

        let remaining = hosts.len() - attempt - 1;
        warn!(
            host = %host,
            attempt,
            remaining,
            error = %error,
            "Host failed, trying next host"
        );
        if remaining > 0 {
            metrics::try_record_failover();
        }
        last_error = Some(error);
    }

    Err(last_error.unwrap_or(TransportError::NoHosts))
}
