//! Index search backend (Elasticsearch behind the catalog search proxy) / 索引搜索后端
//!
//! The primary backend: always present once authenticated.

use serde_json::{json, Value};
use std::sync::Arc;

use super::{call_with_timeout, BackendQuery, BackendSettings, BackendStatus, CatalogTransport};
use crate::error::{TransportError, TransportErrorKind};
use crate::search::schema::{RawHit, RawSearchPage};

pub struct IndexSearchBackend {
    transport: Arc<dyn CatalogTransport>,
    settings: BackendSettings,
}

impl IndexSearchBackend {
    pub fn new(transport: Arc<dyn CatalogTransport>, settings: BackendSettings) -> Self {
        Self { transport, settings }
    }

    fn search_path(&self, pattern: &str) -> String {
        format!(
            "{}/{}/_search",
            self.settings.index_search_path.trim_end_matches('/'),
            pattern
        )
    }

    /// Probe with an empty search against the probe index / 用空查询探测
    pub async fn probe(&self) -> BackendStatus {
        let body = json!({ "size": 0, "query": { "match_all": {} } });
        let path = self.search_path(&self.settings.probe_index);

        match call_with_timeout(self.transport.as_ref(), self.settings.timeout, &path, &body).await {
            Ok(value) => match value.get("error") {
                Some(_) => {
                    let err = upstream_error(&value);
                    tracing::warn!("Index search probe returned an error: {}", err);
                    BackendStatus::Error
                }
                None => BackendStatus::Available,
            },
            Err(e) => {
                tracing::warn!("Index search probe failed: {}", e);
                probe_failure_status(&e)
            }
        }
    }

    pub async fn search(&self, query: &BackendQuery) -> Result<RawSearchPage, TransportError> {
        let size = if query.count_only { 0 } else { query.limit };
        let body = json!({
            "query": query.filter.to_json(),
            "size": size,
            "track_total_hits": true,
        });
        let path = self.search_path(&query.targets.pattern);

        tracing::debug!("Index search: targets={}, size={}", query.targets.pattern, size);

        let value = call_with_timeout(self.transport.as_ref(), self.settings.timeout, &path, &body).await?;
        parse_response(&value)
    }
}

/// Map a failed probe to a status / 探测失败对应的状态
pub(crate) fn probe_failure_status(err: &TransportError) -> BackendStatus {
    match err.kind {
        TransportErrorKind::Timeout | TransportErrorKind::Connect => BackendStatus::Unavailable,
        TransportErrorKind::Status if err.status.map_or(false, |s| s >= 500) => {
            BackendStatus::Unavailable
        }
        _ => BackendStatus::Error,
    }
}

/// Parse an Elasticsearch search response / 解析搜索响应
pub(crate) fn parse_response(value: &Value) -> Result<RawSearchPage, TransportError> {
    if value.get("error").is_some() {
        return Err(upstream_error(value));
    }

    let hits = value
        .get("hits")
        .ok_or_else(|| TransportError::decode("search response has no `hits` section"))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(obj @ Value::Object(_)) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    };

    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_hit).collect())
        .unwrap_or_default();

    Ok(RawSearchPage { total, hits })
}

fn parse_hit(hit: &Value) -> RawHit {
    RawHit {
        index: hit.get("_index").and_then(Value::as_str).unwrap_or("").to_string(),
        id: hit.get("_id").and_then(Value::as_str).unwrap_or("").to_string(),
        score: hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
        source: hit.get("_source").cloned().unwrap_or_else(|| json!({})),
    }
}

/// Build a transport error from an `{"error": ..., "status": ...}` payload
fn upstream_error(value: &Value) -> TransportError {
    let status = value
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok());

    let message = match value.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(err) => {
            let kind = err.get("type").and_then(Value::as_str).unwrap_or("error");
            let reason = err.get("reason").and_then(Value::as_str).unwrap_or("");
            format!("{}: {}", kind, reason)
        }
        None => "unknown search error".to_string(),
    };

    TransportError::upstream(status, message)
}
