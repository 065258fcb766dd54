//! Structured query backend (catalog GraphQL API) / 结构化查询后端
//!
//! Results are reshaped into index-document field names so the scope
//! handlers parse both backends the same way.

use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;

use super::index_search::probe_failure_status;
use super::{call_with_timeout, BackendQuery, BackendSettings, BackendStatus, CatalogTransport};
use crate::error::{TransportError, TransportErrorKind};
use crate::search::schema::{RawHit, RawSearchPage, ResultType};

const SEARCH_OBJECTS: &str = r#"query SearchObjects($buckets: [String!], $searchString: String, $size: Int) {
  searchObjects(buckets: $buckets, searchString: $searchString) {
    __typename
    ... on ObjectsSearchResultSet {
      total
      firstPage(size: $size) { hits { id score bucket key version size modified deleted } }
    }
    ... on InvalidInput { errors { path message } }
    ... on OperationError { message }
  }
}"#;

const SEARCH_PACKAGES: &str = r#"query SearchPackages($buckets: [String!], $searchString: String, $size: Int, $latestOnly: Boolean!) {
  searchPackages(buckets: $buckets, searchString: $searchString, latestOnly: $latestOnly) {
    __typename
    ... on PackagesSearchResultSet {
      total
      firstPage(size: $size) { hits { id score bucket name pointer hash size modified totalEntriesCount comment meta } }
    }
    ... on InvalidInput { errors { path message } }
    ... on OperationError { message }
  }
}"#;

const INTROSPECT_QUERY: &str = r#"query { __type(name: "Query") { fields { name } } }"#;

/// Fields the catalog must expose for this backend to apply / 必需的查询字段
const REQUIRED_FIELDS: &[&str] = &["searchObjects", "searchPackages"];

pub struct StructuredQueryBackend {
    transport: Arc<dyn CatalogTransport>,
    settings: BackendSettings,
}

impl StructuredQueryBackend {
    pub fn new(transport: Arc<dyn CatalogTransport>, settings: BackendSettings) -> Self {
        Self { transport, settings }
    }

    /// Introspect the `Query` type / 内省探测
    pub async fn probe(&self) -> BackendStatus {
        if !self.settings.structured_query_enabled {
            tracing::debug!("Structured query backend disabled by configuration");
            return BackendStatus::NotApplicable;
        }

        let body = json!({ "query": INTROSPECT_QUERY });
        let value = match call_with_timeout(
            self.transport.as_ref(),
            self.settings.timeout,
            &self.settings.graphql_path,
            &body,
        )
        .await
        {
            Ok(v) => v,
            Err(e) if e.kind == TransportErrorKind::Status && e.status == Some(404) => {
                tracing::info!("Catalog exposes no GraphQL endpoint, structured search not applicable");
                return BackendStatus::NotApplicable;
            }
            Err(e) => {
                tracing::warn!("Structured query probe failed: {}", e);
                return probe_failure_status(&e);
            }
        };

        if let Some(err) = graphql_error(&value) {
            tracing::warn!("Structured query probe returned errors: {}", err);
            return BackendStatus::Error;
        }

        let fields: Vec<&str> = value
            .pointer("/data/__type/fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();

        if REQUIRED_FIELDS.iter().all(|f| fields.contains(f)) {
            BackendStatus::Available
        } else {
            tracing::info!("Catalog GraphQL schema lacks search fields, structured search not applicable");
            BackendStatus::NotApplicable
        }
    }

    pub async fn search(&self, query: &BackendQuery) -> Result<RawSearchPage, TransportError> {
        let search_string = query.filter.text().unwrap_or("*");
        let buckets = if query.targets.locations.is_empty() {
            Value::Null
        } else {
            json!(query.targets.locations)
        };
        let size = query.limit.max(1);

        tracing::debug!(
            "Structured search: buckets={}, types={:?}, size={}",
            buckets,
            query.entity_types,
            size
        );

        let mut merged = RawSearchPage::default();

        if query.wants(ResultType::File) {
            let variables = json!({ "buckets": buckets, "searchString": search_string, "size": size });
            let data = self.run(SEARCH_OBJECTS, variables).await?;
            let page = result_set(&data, "searchObjects")?;
            merged.total += page.total;
            merged.hits.extend(page.hits.iter().map(object_hit));
        }

        if query.wants(ResultType::Package) {
            let variables = json!({
                "buckets": buckets,
                "searchString": search_string,
                "size": size,
                "latestOnly": false,
            });
            let data = self.run(SEARCH_PACKAGES, variables).await?;
            let page = result_set(&data, "searchPackages")?;
            merged.total += page.total;
            let suffix = &self.settings.package_index_suffix;
            merged.hits.extend(page.hits.iter().map(|h| package_hit(h, suffix)));
        }

        if query.count_only {
            merged.hits.clear();
        } else {
            merged
                .hits
                .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            merged.hits.truncate(query.limit);
        }

        Ok(merged)
    }

    async fn run(&self, document: &str, variables: Value) -> Result<Value, TransportError> {
        let body = json!({ "query": document, "variables": variables });
        let value = call_with_timeout(
            self.transport.as_ref(),
            self.settings.timeout,
            &self.settings.graphql_path,
            &body,
        )
        .await?;

        if let Some(err) = graphql_error(&value) {
            return Err(err);
        }
        Ok(value.get("data").cloned().unwrap_or(Value::Null))
    }
}

/// Hits of one GraphQL result set / 结果集
struct ResultSet {
    total: u64,
    hits: Vec<Value>,
}

fn result_set(data: &Value, field: &str) -> Result<ResultSet, TransportError> {
    let result = data
        .get(field)
        .ok_or_else(|| TransportError::decode(format!("GraphQL response has no `{}` field", field)))?;

    match result.get("__typename").and_then(Value::as_str).unwrap_or("") {
        "InvalidInput" => {
            let messages: Vec<&str> = result
                .get("errors")
                .and_then(Value::as_array)
                .map(|errs| {
                    errs.iter()
                        .filter_map(|e| e.get("message").and_then(Value::as_str))
                        .collect()
                })
                .unwrap_or_default();
            Err(TransportError::upstream(
                None,
                format!("invalid search input: {}", messages.join("; ")),
            ))
        }
        "OperationError" => Err(TransportError::upstream(
            None,
            result
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("search operation failed")
                .to_string(),
        )),
        "EmptySearchResultSet" => Ok(ResultSet { total: 0, hits: Vec::new() }),
        _ => Ok(ResultSet {
            total: result.get("total").and_then(Value::as_u64).unwrap_or(0),
            hits: result
                .pointer("/firstPage/hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }),
    }
}

/// First entry of a GraphQL `errors` array as a transport error
fn graphql_error(value: &Value) -> Option<TransportError> {
    let first = value.get("errors")?.as_array()?.first()?;
    let message = first
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("GraphQL error")
        .to_string();
    let status = match first.pointer("/extensions/code").and_then(Value::as_str) {
        Some("FORBIDDEN") => Some(403),
        Some("UNAUTHENTICATED") => Some(401),
        _ => None,
    };
    Some(TransportError::upstream(status, message))
}

fn str_field(hit: &Value, name: &str) -> String {
    hit.get(name).and_then(Value::as_str).unwrap_or("").to_string()
}

fn object_hit(hit: &Value) -> RawHit {
    let source = json!({
        "key": str_field(hit, "key"),
        "version_id": str_field(hit, "version"),
        "size": hit.get("size").and_then(Value::as_u64).unwrap_or(0),
        "last_modified": str_field(hit, "modified"),
        "delete_marker": hit.get("deleted").and_then(Value::as_bool).unwrap_or(false),
    });
    RawHit {
        index: str_field(hit, "bucket"),
        id: str_field(hit, "id"),
        score: hit.get("score").and_then(Value::as_f64).unwrap_or(0.0),
        source,
    }
}

fn package_hit(hit: &Value, suffix: &str) -> RawHit {
    // `meta` arrives as a JSON-encoded string
    let metadata = match hit.get("meta") {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| Value::Object(Map::new())),
        Some(v @ Value::Object(_)) => v.clone(),
        _ => Value::Object(Map::new()),
    };
    let source = json!({
        "ptr_name": str_field(hit, "name"),
        "ptr_tag": str_field(hit, "pointer"),
        "mnfst_hash": str_field(hit, "hash"),
        "mnfst_last_modified": str_field(hit, "modified"),
        "mnfst_message": str_field(hit, "comment"),
        "mnfst_stats": {
            "total_files": hit.get("totalEntriesCount").and_then(Value::as_u64).unwrap_or(0),
            "total_bytes": hit.get("size").and_then(Value::as_u64).unwrap_or(0),
        },
        "mnfst_metadata": metadata,
    });
    RawHit {
        index: format!("{}{}", str_field(hit, "bucket"), suffix),
        id: str_field(hit, "id"),
        score: hit.get("score").and_then(Value::as_f64).unwrap_or(0.0),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::search::schema::{QueryExpression, TargetSpec};
    use crate::test_support::FakeTransport;

    fn backend(transport: Arc<FakeTransport>, enabled: bool) -> StructuredQueryBackend {
        let mut config = BackendConfig::default();
        config.structured_query_enabled = enabled;
        StructuredQueryBackend::new(transport, BackendSettings::from_config(&config, None))
    }

    fn query(types: Vec<ResultType>, locations: Vec<&str>) -> BackendQuery {
        BackendQuery {
            entity_types: types,
            targets: TargetSpec {
                pattern: String::new(),
                locations: locations.into_iter().map(String::from).collect(),
            },
            filter: QueryExpression::query_string("data"),
            limit: 2,
            count_only: false,
        }
    }

    fn objects_response() -> Value {
        json!({ "data": { "searchObjects": {
            "__typename": "ObjectsSearchResultSet",
            "total": 2,
            "firstPage": { "hits": [
                { "id": "o1", "score": 1.0, "bucket": "demo", "key": "data/a.csv", "version": "v1",
                  "size": 12, "modified": "2024-01-01T00:00:00Z", "deleted": false },
                { "id": "o2", "score": 3.0, "bucket": "demo", "key": "data/b.csv", "version": "",
                  "size": 5, "modified": "2024-01-02T00:00:00Z", "deleted": false }
            ] }
        } } })
    }

    fn packages_response() -> Value {
        json!({ "data": { "searchPackages": {
            "__typename": "PackagesSearchResultSet",
            "total": 1,
            "firstPage": { "hits": [
                { "id": "p1", "score": 2.0, "bucket": "demo", "name": "team/data", "pointer": "latest",
                  "hash": "abc123", "size": 2048, "modified": "2024-02-01T00:00:00Z",
                  "totalEntriesCount": 4, "comment": "first", "meta": "{\"owner\":\"lab\"}" }
            ] }
        } } })
    }

    #[tokio::test]
    async fn test_object_search_reshapes_hits() {
        let transport = Arc::new(FakeTransport::new(|_, _| Ok(objects_response())));
        let page = backend(transport.clone(), true)
            .search(&query(vec![ResultType::File], vec!["demo"]))
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/graphql");
        assert_eq!(calls[0].1["variables"]["buckets"], json!(["demo"]));
        assert_eq!(calls[0].1["variables"]["searchString"], "data");

        assert_eq!(page.total, 2);
        assert_eq!(page.hits[0].source["key"], "data/b.csv");
        assert_eq!(page.hits[0].index, "demo");
        assert_eq!(page.hits[1].source["version_id"], "v1");
    }

    #[tokio::test]
    async fn test_global_merges_by_score() {
        let transport = Arc::new(FakeTransport::new(|_, body| {
            let document = body["query"].as_str().unwrap_or("");
            if document.contains("searchPackages") {
                Ok(packages_response())
            } else {
                Ok(objects_response())
            }
        }));
        let page = backend(transport.clone(), true)
            .search(&query(vec![ResultType::File, ResultType::Package], vec![]))
            .await
            .unwrap();

        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.calls()[1].1["variables"]["buckets"], Value::Null);
        assert_eq!(transport.calls()[1].1["variables"]["latestOnly"], false);
        assert_eq!(page.total, 3);
        assert_eq!(page.hits.len(), 2);
        assert_eq!(page.hits[0].score, 3.0);
        assert_eq!(page.hits[1].index, "demo_packages");
        assert_eq!(page.hits[1].source["ptr_name"], "team/data");
        assert_eq!(page.hits[1].source["mnfst_metadata"]["owner"], "lab");
        assert_eq!(page.hits[1].source["mnfst_stats"]["total_files"], 4);
    }

    #[tokio::test]
    async fn test_forbidden_error_carries_status() {
        let transport = Arc::new(FakeTransport::new(|_, _| {
            Ok(json!({ "errors": [{ "message": "Forbidden", "extensions": { "code": "FORBIDDEN" } }] }))
        }));
        let err = backend(transport, true)
            .search(&query(vec![ResultType::File], vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Upstream);
        assert_eq!(err.status, Some(403));
    }

    #[tokio::test]
    async fn test_invalid_input_is_upstream_error() {
        let transport = Arc::new(FakeTransport::new(|_, _| {
            Ok(json!({ "data": { "searchObjects": {
                "__typename": "InvalidInput",
                "errors": [{ "path": "searchString", "message": "bad syntax" }]
            } } }))
        }));
        let err = backend(transport, true)
            .search(&query(vec![ResultType::File], vec![]))
            .await
            .unwrap_err();
        assert!(err.message.contains("bad syntax"));
    }

    #[tokio::test]
    async fn test_probe() {
        let full = Arc::new(FakeTransport::new(|_, _| {
            Ok(json!({ "data": { "__type": { "fields": [
                { "name": "searchObjects" }, { "name": "searchPackages" }, { "name": "bucketConfigs" }
            ] } } }))
        }));
        assert_eq!(backend(full, true).probe().await, BackendStatus::Available);

        let partial = Arc::new(FakeTransport::new(|_, _| {
            Ok(json!({ "data": { "__type": { "fields": [{ "name": "bucketConfigs" }] } } }))
        }));
        assert_eq!(backend(partial, true).probe().await, BackendStatus::NotApplicable);

        let missing = Arc::new(FakeTransport::new(|_, _| Err(TransportError::status(404, "404"))));
        assert_eq!(backend(missing, true).probe().await, BackendStatus::NotApplicable);

        let unreachable = Arc::new(FakeTransport::new(|_, _| Err(TransportError::connect("refused"))));
        assert_eq!(backend(unreachable, true).probe().await, BackendStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_disabled_backend_skips_probe() {
        let transport = Arc::new(FakeTransport::new(|_, _| Ok(json!({}))));
        assert_eq!(backend(transport.clone(), false).probe().await, BackendStatus::NotApplicable);
        assert_eq!(transport.call_count(), 0);
    }
}
