//! Test doubles and index-document fixtures / 测试替身与文档样例

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::time::Duration;

use crate::backend::CatalogTransport;
use crate::error::TransportError;
use crate::session::CatalogSession;

type Responder = Box<dyn Fn(&str, &Value) -> Result<Value, TransportError> + Send + Sync>;

/// Recording transport answering from a closure / 记录调用的假传输
pub struct FakeTransport {
    responder: Responder,
    delay: Option<Duration>,
    /// Delay searches only, never reachability checks
    searches_only: bool,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            searches_only: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `value` after `delay`
    pub fn slow(delay: Duration, value: Value) -> Self {
        let mut transport = Self::new(move |_, _| Ok(value.clone()));
        transport.delay = Some(delay);
        transport
    }

    /// Hold every search call for `delay`; reachability checks answer at once
    pub fn delay_searches(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self.searches_only = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls that were searches rather than probes
    pub fn search_calls(&self) -> Vec<(String, Value)> {
        self.calls().into_iter().filter(|(_, body)| !is_probe(body)).collect()
    }
}

#[async_trait]
impl CatalogTransport for FakeTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.calls.lock().push((path.to_string(), body.clone()));
        if let Some(delay) = self.delay {
            if !(self.searches_only && is_probe(body)) {
                tokio::time::sleep(delay).await;
            }
        }
        (self.responder)(path, body)
    }
}

/// Whether a recorded body is a backend probe / 是否为探测请求
pub fn is_probe(body: &Value) -> bool {
    body.pointer("/query/match_all").is_some()
        || body
            .get("query")
            .and_then(Value::as_str)
            .map_or(false, |q| q.contains("__type("))
}

pub struct FakeSession {
    pub authenticated: bool,
}

impl CatalogSession for FakeSession {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn current_endpoint(&self) -> Option<String> {
        Some("https://catalog.example.com".to_string())
    }

    fn access_token(&self) -> Option<String> {
        self.authenticated.then(|| "token".to_string())
    }
}

pub fn es_hit(index: &str, id: &str, score: f64, source: Value) -> Value {
    json!({ "_index": index, "_id": id, "_score": score, "_source": source })
}

pub fn es_response(total: u64, hits: Vec<Value>) -> Value {
    json!({
        "took": 3,
        "timed_out": false,
        "hits": { "total": { "value": total, "relation": "eq" }, "max_score": 1.0, "hits": hits }
    })
}

pub fn es_error(status: u16, kind: &str, reason: &str) -> Value {
    json!({ "error": { "type": kind, "reason": reason }, "status": status })
}

/// Object document from a bucket index / 对象文档
pub fn object_doc(key: &str, size: u64) -> Value {
    json!({
        "key": key,
        "size": size,
        "version_id": "v1",
        "last_modified": "2024-03-01T12:00:00Z",
        "etag": "\"0123abcd\"",
        "delete_marker": false,
        "content": "col_a,col_b\n1,2\n3,4",
    })
}

/// Package manifest document from a `_packages` index / 包清单文档
pub fn manifest_doc(name: &str, hash: &str) -> Value {
    json!({
        "ptr_name": name,
        "ptr_tag": "latest",
        "mnfst_hash": hash,
        "mnfst_last_modified": "2024-03-02T08:30:00Z",
        "mnfst_message": "initial import",
        "mnfst_stats": { "total_files": 3, "total_bytes": 4096 },
        "mnfst_metadata": { "owner": "lab" },
    })
}

/// Package entry document (one file inside a package) / 包内条目文档
pub fn entry_doc(logical_key: &str, physical_key: &str) -> Value {
    json!({
        "entry_lk": logical_key,
        "entry_pk": physical_key,
        "entry_size": 64,
        "entry_hash": { "type": "SHA256", "value": "ff00" },
        "mnfst_hash": "abc123",
        "mnfst_last_modified": "2024-03-02T08:30:00Z",
    })
}

/// GraphQL introspection answer listing both search fields
pub fn introspection_response() -> Value {
    json!({ "data": { "__type": { "fields": [
        { "name": "searchObjects" },
        { "name": "searchPackages" },
        { "name": "bucketConfigs" }
    ] } } })
}
