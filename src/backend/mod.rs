//! Search backends - only execute queries, do not decide flow / 搜索后端
//!
//! Architecture principles / 架构原则：
//! - Backends expose primitives only: probe, search / 后端只提供原语
//! - Selection, retry and fallback live in the search core / 选择、重试和回退由核心负责
//! - Both backends produce the same `RawSearchPage` intermediate form / 统一中间结果

pub mod index_search;
pub mod selector;
pub mod structured;
pub mod transport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{SearchError, TransportError};
use crate::search::schema::{QueryExpression, RawSearchPage, ResultType, TargetSpec};

pub use index_search::IndexSearchBackend;
pub use selector::SearchSession;
pub use structured::StructuredQueryBackend;
pub use transport::HttpTransport;

/// Backend kind / 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Index-based full-text engine / 全文索引引擎
    Elasticsearch,
    /// Structured query engine / 结构化查询引擎
    Graphql,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Elasticsearch => "elasticsearch",
            BackendKind::Graphql => "graphql",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend lifecycle status / 后端状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    /// Never checked / 未检查
    #[default]
    Unknown,
    /// Probe in flight / 验证中
    Verifying,
    Available,
    /// Unreachable (timeout, connection refused) / 不可达
    Unavailable,
    /// Absent in this deployment by design / 当前部署不提供
    NotApplicable,
    /// Reachable but failing / 出错
    Error,
}

/// HTTP transport towards the catalog / 目录传输接口
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// POST a JSON body to `path` (relative to the catalog endpoint) / 发送JSON请求
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError>;
}

/// Settings shared by both adapters / 后端通用设置
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub timeout: Duration,
    pub index_search_path: String,
    pub graphql_path: String,
    pub structured_query_enabled: bool,
    pub package_index_suffix: String,
    /// Index probed during verification (default location, or `*`)
    pub probe_index: String,
}

impl BackendSettings {
    pub fn from_config(config: &BackendConfig, default_location: Option<&str>) -> Self {
        Self {
            timeout: config.timeout(),
            index_search_path: config.index_search_path.clone(),
            graphql_path: config.graphql_path.clone(),
            structured_query_enabled: config.structured_query_enabled,
            package_index_suffix: config.package_index_suffix.clone(),
            probe_index: default_location.unwrap_or("*").to_string(),
        }
    }
}

/// One backend search request / 后端查询请求
#[derive(Debug, Clone)]
pub struct BackendQuery {
    /// Entity types the active scope accepts / 当前范围接受的实体类型
    pub entity_types: Vec<ResultType>,
    pub targets: TargetSpec,
    pub filter: QueryExpression,
    pub limit: usize,
    pub count_only: bool,
}

impl BackendQuery {
    pub fn wants(&self, result_type: ResultType) -> bool {
        self.entity_types.contains(&result_type)
    }
}

/// The selected backend: a closed set of two adapters / 后端适配器
pub enum CatalogBackend {
    IndexSearch(IndexSearchBackend),
    StructuredQuery(StructuredQueryBackend),
}

impl fmt::Debug for CatalogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CatalogBackend").field(&self.kind()).finish()
    }
}

impl CatalogBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            CatalogBackend::IndexSearch(_) => BackendKind::Elasticsearch,
            CatalogBackend::StructuredQuery(_) => BackendKind::Graphql,
        }
    }

    /// Round-trip reachability probe / 连通性探测
    pub async fn probe(&self) -> BackendStatus {
        match self {
            CatalogBackend::IndexSearch(b) => b.probe().await,
            CatalogBackend::StructuredQuery(b) => b.probe().await,
        }
    }

    /// Whether the backend is reachable and usable / 验证后端可用
    pub async fn verify(&self) -> bool {
        self.probe().await == BackendStatus::Available
    }

    /// Execute one search / 执行搜索
    pub async fn search(&self, query: &BackendQuery) -> Result<RawSearchPage, SearchError> {
        let result = match self {
            CatalogBackend::IndexSearch(b) => b.search(query).await,
            CatalogBackend::StructuredQuery(b) => b.search(query).await,
        };
        result.map_err(|e| SearchError::backend(self.kind(), e))
    }
}

/// Run one transport call under the per-call timeout / 带超时的后端调用
pub(crate) async fn call_with_timeout(
    transport: &dyn CatalogTransport,
    timeout: Duration,
    path: &str,
    body: &Value,
) -> Result<Value, TransportError> {
    match tokio::time::timeout(timeout, transport.post_json(path, body)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::timeout(timeout.as_millis() as u64)),
    }
}
