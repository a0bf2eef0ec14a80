//! reqwest-backed [`HttpSend`]

use super::{HttpRequest, HttpResponse, HttpSend, TransportError, TransportSettings};
use async_trait::async_trait;
use reqwest::Method;

/// Production sender
///
/// One client per consumer, built from its [`TransportSettings`], so the
/// connection pool is reused across events.
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.allow_self_signed_cert);

        if let Some(proxy) = &settings.proxy {
            let mut configured = reqwest::Proxy::all(proxy.url())
                .map_err(|e| TransportError::InvalidRequest(format!("proxy {}: {e}", proxy.url())))?;
            if let Some(username) = &proxy.username {
                configured = configured.basic_auth(username, proxy.passphrase.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(configured);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn send(&self, host: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("method '{}'", request.method)))?;

        let mut builder = self.client.request(method, request.url(host));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let connection_error = |e: reqwest::Error| TransportError::Connection {
            host: host.to_string(),
            message: e.to_string(),
        };

        let response = builder.send().await.map_err(connection_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(connection_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
