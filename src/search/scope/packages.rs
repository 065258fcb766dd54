//! Packages scope: package manifests only / 包范围

use std::collections::BTreeSet;

use super::{classify_document, parse_manifest, DocumentShape, ParseContext, ScopeHandler};
use crate::error::SearchError;
use crate::search::schema::{QueryExpression, RawHit, ResultType, SearchResult, TargetSpec};
use crate::search::Scope;

pub struct PackagesScope {
    suffix: String,
}

impl PackagesScope {
    pub fn new(package_index_suffix: &str) -> Self {
        Self { suffix: package_index_suffix.to_string() }
    }
}

impl ScopeHandler for PackagesScope {
    fn scope(&self) -> Scope {
        Scope::Packages
    }

    fn name(&self) -> &'static str {
        "packages"
    }

    fn build_targets(&self, locations: &BTreeSet<String>) -> Result<TargetSpec, SearchError> {
        if locations.is_empty() {
            return Ok(TargetSpec { pattern: format!("*{}", self.suffix), locations: Vec::new() });
        }
        let pattern = locations
            .iter()
            .map(|l| format!("{}{}", l, self.suffix))
            .collect::<Vec<_>>()
            .join(",");
        Ok(TargetSpec { pattern, locations: locations.iter().cloned().collect() })
    }

    /// Manifest documents only: entries share the index but carry entry fields
    fn build_query_filter(&self, escaped: &str) -> QueryExpression {
        QueryExpression::Bool {
            must: vec![QueryExpression::query_string(escaped)],
            filter: vec![QueryExpression::exists("ptr_name")],
            must_not: vec![QueryExpression::exists("entry_lk"), QueryExpression::exists("entry_pk")],
        }
    }

    fn parse_result(&self, hit: &RawHit, location: &str, ctx: &ParseContext) -> Option<SearchResult> {
        match classify_document(&hit.source) {
            DocumentShape::Manifest => parse_manifest(hit, location, ctx),
            shape => {
                tracing::debug!("Packages scope rejected {:?} document {} from {}", shape, hit.id, hit.index);
                None
            }
        }
    }

    fn expected_result_types(&self) -> &'static [ResultType] {
        &[ResultType::Package]
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

    #[test]
    fn test_targets() {
        let scope = PackagesScope::new("_packages");
        let wildcard = scope.build_targets(&BTreeSet::new()).unwrap();
        assert_eq!(wildcard.pattern, "*_packages");
        assert!(wildcard.locations.is_empty());

        let locations: BTreeSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        assert_eq!(scope.build_targets(&locations).unwrap().pattern, "a_packages,b_packages");
    }

    #[test]
    fn test_filter_excludes_entries() {
        let json = PackagesScope::new("_packages").build_query_filter("*").to_json();
        assert_eq!(json["bool"]["must"][0]["query_string"]["query"], "*");
        assert_eq!(json["bool"]["filter"][0]["exists"]["field"], "ptr_name");
        assert_eq!(json["bool"]["must_not"][0]["exists"]["field"], "entry_lk");
        assert_eq!(json["bool"]["must_not"][1]["exists"]["field"], "entry_pk");
    }

    #[test]
    fn test_only_manifests_accepted() {
        let scope = PackagesScope::new("_packages");
        let result = scope
            .parse_result(&hit("a_packages", manifest_doc("t/p", "h1")), "a", &ctx())
            .unwrap();
        assert_eq!(result.result_type, ResultType::Package);
        assert!(scope
            .parse_result(&hit("a_packages", entry_doc("x.csv", "s3://a/x.csv")), "a", &ctx())
            .is_none());
        assert!(scope.parse_result(&hit("a", object_doc("x.csv", 1)), "a", &ctx()).is_none());
    }
}
