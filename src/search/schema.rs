//! Search schema definition / 搜索结果与查询结构定义

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::backend::BackendKind;

/// Result entity type / 结果类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    File,
    Package,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::File => "file",
            ResultType::Package => "package",
        }
    }
}

/// Normalized search result, identical for every backend / 统一的搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// `s3://bucket/key` for files, `quilt+s3://bucket#package=name@hash` for packages
    pub id: String,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    /// Object key for files, `namespace/name` for packages / 统一标识
    pub name: String,
    pub title: String,
    pub description: String,
    /// Backend relevance score, not comparable across backends / 相关性分数
    pub score: f64,
    pub backend: BackendKind,
    /// Bare bucket name / 桶名
    pub location: String,
    /// Bytes; manifest size for packages / 大小
    pub size: u64,
    pub last_modified: String,
    pub content_type: String,
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
    pub metadata: Map<String, Value>,
}

/// One backend hit in the common intermediate form / 后端原始命中
///
/// `index` is the bucket for object documents and `{bucket}{suffix}` for
/// package-index documents; `source` uses index-document field names.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub index: String,
    pub id: String,
    pub score: f64,
    pub source: Value,
}

/// One page of raw hits plus the backend-reported total / 原始结果页
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSearchPage {
    pub total: u64,
    pub hits: Vec<RawHit>,
}

/// Backend target specification / 查询目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSpec {
    /// Comma-joined index pattern for the index backend / 索引模式
    pub pattern: String,
    /// Buckets for the structured backend (empty = all) / 桶列表
    pub locations: Vec<String>,
}

impl TargetSpec {
    /// True when more than one location (or a wildcard) is targeted
    pub fn is_multi_location(&self) -> bool {
        self.locations.len() != 1
    }
}

/// Structural query expression / 查询表达式
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpression {
    QueryString { query: String },
    Exists { field: String },
    Bool {
        must: Vec<QueryExpression>,
        filter: Vec<QueryExpression>,
        must_not: Vec<QueryExpression>,
    },
}

impl QueryExpression {
    pub fn query_string(query: impl Into<String>) -> Self {
        Self::QueryString { query: query.into() }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists { field: field.into() }
    }

    /// The free-text part of the expression / 表达式中的查询文本
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::QueryString { query } => Some(query),
            Self::Exists { .. } => None,
            Self::Bool { must, filter, .. } => must.iter().chain(filter).find_map(|e| e.text()),
        }
    }

    /// Render as an Elasticsearch query clause / 转换为 Elasticsearch 查询
    pub fn to_json(&self) -> Value {
        match self {
            Self::QueryString { query } => json!({
                "query_string": {
                    "query": query,
                    "default_operator": "AND",
                    "analyze_wildcard": true,
                }
            }),
            Self::Exists { field } => json!({ "exists": { "field": field } }),
            Self::Bool { must, filter, must_not } => {
                let mut clause = Map::new();
                for (name, items) in [("must", must), ("filter", filter), ("must_not", must_not)] {
                    if !items.is_empty() {
                        clause.insert(
                            name.to_string(),
                            Value::Array(items.iter().map(|e| e.to_json()).collect()),
                        );
                    }
                }
                json!({ "bool": clause })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_json() {
        let expr = QueryExpression::query_string("*.csv");
        assert_eq!(expr.to_json()["query_string"]["query"], "*.csv");
        assert_eq!(expr.text(), Some("*.csv"));
    }

    #[test]
    fn test_bool_json_skips_empty_clauses() {
        let expr = QueryExpression::Bool {
            must: vec![QueryExpression::query_string("data")],
            filter: vec![QueryExpression::exists("ptr_name")],
            must_not: vec![],
        };
        let value = expr.to_json();
        assert_eq!(value["bool"]["filter"][0]["exists"]["field"], "ptr_name");
        assert!(value["bool"].get("must_not").is_none());
        assert_eq!(expr.text(), Some("data"));
    }

    #[test]
    fn test_result_type_serialization() {
        assert_eq!(serde_json::to_value(ResultType::Package).unwrap(), json!("package"));
        assert_eq!(ResultType::File.as_str(), "file");
    }

    #[test]
    fn test_multi_location() {
        let single = TargetSpec { pattern: "a".into(), locations: vec!["a".into()] };
        let wildcard = TargetSpec { pattern: "*".into(), locations: vec![] };
        let many = TargetSpec { pattern: "a,b".into(), locations: vec!["a".into(), "b".into()] };
        assert!(!single.is_multi_location());
        assert!(wildcard.is_multi_location());
        assert!(many.is_multi_location());
    }
}
