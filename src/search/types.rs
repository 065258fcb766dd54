//! Search request and response types / 搜索请求与响应类型

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::classify::Fix;
use super::normalize::Confidence;
use super::schema::SearchResult;
use crate::backend::BackendKind;
use crate::error::ErrorCategory;

fn default_scope() -> String {
    "global".to_string()
}

fn default_true() -> bool {
    true
}

/// Search request / 搜索请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// `global`, `packages`, `bucket` or `file`
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Bucket name or URI; required for `bucket` / 存储位置
    #[serde(default)]
    pub location: String,
    /// Defaults to `limits.default_limit` / 结果数量上限
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub count_only: bool,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default)]
    pub explain: bool,
    #[serde(default)]
    pub include_content_preview: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            scope: default_scope(),
            location: String::new(),
            limit: None,
            count_only: false,
            include_metadata: true,
            explain: false,
            include_content_preview: false,
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn count_only(mut self, count_only: bool) -> Self {
        self.count_only = count_only;
        self
    }

    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }
}

/// Successful search / 搜索成功
#[derive(Debug, Clone, Serialize)]
pub struct SearchSuccess {
    pub success: bool,
    pub query: String,
    pub scope: String,
    pub location: String,
    pub backend_used: BackendKind,
    pub results: Vec<SearchResult>,
    /// Backend-reported total, independent of `limit` / 后端报告的总数
    pub total: u64,
    pub query_time_ms: f64,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetails {
    pub cause: String,
    pub authenticated: bool,
    pub catalog_reachable: bool,
}

/// Failed search / 搜索失败
#[derive(Debug, Clone, Serialize)]
pub struct SearchFailure {
    pub success: bool,
    pub error: String,
    pub error_category: ErrorCategory,
    pub details: ErrorDetails,
    pub fix: Fix,
    /// Tool name -> description / 替代工具
    pub alternatives: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Success(SearchSuccess),
    Failure(SearchFailure),
}

impl SearchResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchResponse::Success(_))
    }
}
