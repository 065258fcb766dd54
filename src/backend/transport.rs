//! Catalog HTTP transport / 目录HTTP传输

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::CatalogTransport;
use crate::error::TransportError;
use crate::session::CatalogSession;
use crate::utils::truncate_chars;

/// Error bodies are cut to this many characters / 错误响应体截断长度
const MAX_ERROR_BODY: usize = 500;

/// reqwest-backed transport; endpoint and token are read from the session
/// on every call so a catalog switch or credential refresh is picked up
pub struct HttpTransport {
    client: Client,
    session: Arc<dyn CatalogSession>,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(session: Arc<dyn CatalogSession>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::connect(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, session, timeout_ms: timeout.as_millis() as u64 })
    }

    fn url(&self, path: &str) -> Result<String, TransportError> {
        let endpoint = self
            .session
            .current_endpoint()
            .ok_or_else(|| TransportError::connect("No catalog endpoint configured"))?;
        Ok(format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }
}

#[async_trait]
impl CatalogTransport for HttpTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(path)?;
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = self.session.access_token() {
            request = request.bearer_auth(token);
        }

        tracing::debug!("POST {}", url);

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(self.timeout_ms)
            } else {
                TransportError::connect(format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TransportError::status(
                status.as_u16(),
                format!(
                    "{} {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or(""),
                    truncate_chars(&text, MAX_ERROR_BODY)
                ),
            ));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        resp.json::<Value>()
            .await
            .map_err(|e| TransportError::decode(format!("Invalid JSON from {}: {}", url, e)))
    }
}
