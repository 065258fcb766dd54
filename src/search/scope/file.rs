//! File scope: objects in the given buckets / 文件范围

use std::collections::BTreeSet;

use super::{classify_document, parse_object, DocumentShape, ParseContext, ScopeHandler};
use crate::error::SearchError;
use crate::search::schema::{QueryExpression, RawHit, ResultType, SearchResult, TargetSpec};
use crate::search::Scope;

/// Serves both `bucket` and `file`; the two differ only in whether a
/// location is required, which the orchestrator checks.
pub struct FileScope {
    scope: Scope,
}

impl FileScope {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }
}

impl ScopeHandler for FileScope {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn name(&self) -> &'static str {
        "file"
    }

    fn build_targets(&self, locations: &BTreeSet<String>) -> Result<TargetSpec, SearchError> {
        if locations.is_empty() {
            return Err(SearchError::configuration("file search needs at least one location"));
        }
        let locations: Vec<String> = locations.iter().cloned().collect();
        Ok(TargetSpec { pattern: locations.join(","), locations })
    }

    fn build_query_filter(&self, escaped: &str) -> QueryExpression {
        QueryExpression::query_string(escaped)
    }

    fn parse_result(&self, hit: &RawHit, location: &str, ctx: &ParseContext) -> Option<SearchResult> {
        match classify_document(&hit.source) {
            DocumentShape::Object => parse_object(hit, location, ctx),
            shape => {
                tracing::debug!("File scope rejected {:?} document {} from {}", shape, hit.id, hit.index);
                None
            }
        }
    }

    fn expected_result_types(&self) -> &'static [ResultType] {
        &[ResultType::File]
    }

    fn rejects_by_design(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::scope::tests::{ctx, hit};
    use crate::test_support::{entry_doc, manifest_doc, object_doc};
    use serde_json::json;

    #[test]
    fn test_targets_are_bucket_indices() {
        let locations: BTreeSet<String> = ["b".to_string(), "a".to_string()].into_iter().collect();
        let targets = FileScope::new(Scope::Bucket).build_targets(&locations).unwrap();
        assert_eq!(targets.pattern, "a,b");
        assert_eq!(targets.locations, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_locations_rejected() {
        let err = FileScope::new(Scope::File).build_targets(&BTreeSet::new()).unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));
    }

    #[test]
    fn test_only_objects_accepted() {
        let scope = FileScope::new(Scope::File);
        assert!(scope.parse_result(&hit("a", object_doc("x.csv", 1)), "a", &ctx()).is_some());
        assert!(scope
            .parse_result(&hit("a_packages", manifest_doc("t/p", "h")), "a", &ctx())
            .is_none());
        assert!(scope
            .parse_result(&hit("a_packages", entry_doc("x.csv", "s3://a/x.csv")), "a", &ctx())
            .is_none());
        assert!(scope
            .parse_result(&hit("a", json!({ "key": "gone.csv", "delete_marker": true })), "a", &ctx())
            .is_none());
    }
}
