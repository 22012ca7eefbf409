use crate::config::SessionConfig;
use crate::transport::{EventChannel, Transport, TransportError};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Proxy;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed transport: JSON POST for request/response, SSE GET for push channels.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        // No client-wide timeout; every call carries its own deadline.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .pool_max_idle_per_host(config.http.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(
                config.http.pool_idle_timeout_secs,
            )))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.http.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy url: {}", e),
                    ErrorContext::new()
                        .with_field_path("http.proxy_url")
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> Result<url::Url> {
        let joined = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        url::Url::parse(&joined).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot build endpoint url: {}", e),
                ErrorContext::new()
                    .with_details(joined)
                    .with_source("http_transport"),
            )
        })
    }

    async fn remote_error(resp: reqwest::Response) -> Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = remote_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "request failed".to_string());
        Error::remote(Some(status.as_u16()), message)
    }
}

/// Best-effort extraction of a readable reason from an error body.
fn remote_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.chars().take(500).collect());
    };
    for key in ["detail", "error", "message"] {
        match json.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Object(obj)) => {
                if let Some(Value::String(s)) = obj.get("message") {
                    return Some(s.clone());
                }
            }
            Some(other) if !other.is_null() => return Some(other.to_string()),
            _ => {}
        }
    }
    Some(trimmed.chars().take(500).collect())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = self.url(endpoint)?;
        debug!(endpoint, "POST");

        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        if !resp.status().is_success() {
            return Err(Self::remote_error(resp).await);
        }

        resp.json()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    async fn open_channel(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<EventChannel> {
        let mut url = self.url(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in params {
                query.append_pair(k, v);
            }
        }
        debug!(endpoint, "opening event stream");

        let resp = self
            .client
            .get(url)
            .header("accept", "text/event-stream")
            .header("cache-control", "no-cache")
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        if !resp.status().is_success() {
            return Err(Self::remote_error(resp).await);
        }

        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(EventChannel::new(endpoint, Box::pin(byte_stream)))
    }
}
