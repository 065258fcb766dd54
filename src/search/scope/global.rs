//! Global scope: objects and packages together / 全局范围

use std::collections::BTreeSet;

use super::{
    classify_document, parse_entry, parse_manifest, parse_object, DocumentShape, ParseContext,
    ScopeHandler,
};
use crate::error::SearchError;
use crate::search::schema::{QueryExpression, RawHit, ResultType, SearchResult, TargetSpec};
use crate::search::Scope;

pub struct GlobalScope {
    suffix: String,
}

impl GlobalScope {
    pub fn new(package_index_suffix: &str) -> Self {
        Self { suffix: package_index_suffix.to_string() }
    }
}

impl ScopeHandler for GlobalScope {
    fn scope(&self) -> Scope {
        Scope::Global
    }

    fn name(&self) -> &'static str {
        "global"
    }

    fn build_targets(&self, locations: &BTreeSet<String>) -> Result<TargetSpec, SearchError> {
        if locations.is_empty() {
            return Ok(TargetSpec { pattern: "*".to_string(), locations: Vec::new() });
        }
        let indices: Vec<String> = locations
            .iter()
            .cloned()
            .chain(locations.iter().map(|l| format!("{}{}", l, self.suffix)))
            .collect();
        Ok(TargetSpec { pattern: indices.join(","), locations: locations.iter().cloned().collect() })
    }

    fn build_query_filter(&self, escaped: &str) -> QueryExpression {
        QueryExpression::query_string(escaped)
    }

    fn parse_result(&self, hit: &RawHit, location: &str, ctx: &ParseContext) -> Option<SearchResult> {
        let shape = classify_document(&hit.source);
        let parsed = match shape {
            DocumentShape::Object => parse_object(hit, location, ctx),
            DocumentShape::Manifest => parse_manifest(hit, location, ctx),
            DocumentShape::Entry => parse_entry(hit, location, ctx),
            DocumentShape::DeleteMarker => {
                tracing::debug!("Global scope skipped delete marker {} from {}", hit.id, hit.index);
                return None;
            }
            DocumentShape::Unknown => None,
        };
        if parsed.is_none() {
            tracing::warn!(
                "Global scope could not parse {:?} document {} from {}",
                shape,
                hit.id,
                hit.index
            );
        }
        parsed
    }

    fn expected_result_types(&self) -> &'static [ResultType] {
        &[ResultType::File, ResultType::Package]
    }

    fn rejects_by_design(&self) -> bool {
        false
    }
}
