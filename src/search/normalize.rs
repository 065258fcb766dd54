//! Result normalization / 结果标准化

use serde::Serialize;

use super::schema::{RawSearchPage, SearchResult};
use super::scope::{classify_document, DocumentShape, ParseContext, ScopeHandler};
use crate::utils::normalize_location;

/// How much the caller can trust an empty or short result list / 结果可信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Full,
    /// Every hit on the page was unparseable
    Reduced,
}

/// Per-page parse statistics / 解析统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub hits: usize,
    pub parsed: usize,
    /// Dropped on purpose: another scope's documents, or delete markers
    pub rejected: usize,
    /// Hits the handler should have understood but could not parse
    pub unparseable: usize,
}

impl NormalizeStats {
    pub fn confidence(&self) -> Confidence {
        if self.unparseable > 0 && self.unparseable == self.hits {
            Confidence::Reduced
        } else {
            Confidence::Full
        }
    }
}

/// Bucket name of a hit's index (`demo_packages` -> `demo`) / 索引对应的桶
pub fn location_for_index(index: &str, package_index_suffix: &str) -> String {
    let bucket = match index.strip_suffix(package_index_suffix) {
        Some(bucket) if !bucket.is_empty() && !package_index_suffix.is_empty() => bucket,
        _ => index,
    };
    normalize_location(bucket)
}

pub struct ResultNormalizer<'a> {
    handler: &'a dyn ScopeHandler,
    ctx: ParseContext,
    package_index_suffix: &'a str,
}

impl<'a> ResultNormalizer<'a> {
    pub fn new(handler: &'a dyn ScopeHandler, ctx: ParseContext, package_index_suffix: &'a str) -> Self {
        Self { handler, ctx, package_index_suffix }
    }

    /// Parse every hit through the active handler / 标准化结果页
    pub fn normalize(&self, page: &RawSearchPage) -> (Vec<SearchResult>, NormalizeStats) {
        let mut stats = NormalizeStats { hits: page.hits.len(), ..Default::default() };
        let mut results = Vec::with_capacity(page.hits.len());
        let expected = self.handler.expected_result_types();

        for hit in &page.hits {
            let location = location_for_index(&hit.index, self.package_index_suffix);
            match self.handler.parse_result(hit, &location, &self.ctx) {
                Some(result) if expected.contains(&result.result_type) => {
                    stats.parsed += 1;
                    results.push(result);
                }
                Some(result) => {
                    tracing::warn!(
                        "Dropped {} result {} outside the {} scope",
                        result.result_type.as_str(),
                        result.id,
                        self.handler.name()
                    );
                    stats.rejected += 1;
                }
                None if self.handler.rejects_by_design()
                    || classify_document(&hit.source) == DocumentShape::DeleteMarker =>
                {
                    stats.rejected += 1
                }
                None => stats.unparseable += 1,
            }
        }

        if stats.unparseable > 0 {
            tracing::warn!(
                "{} of {} hits could not be parsed in {} scope",
                stats.unparseable,
                stats.hits,
                self.handler.name()
            );
        }

        (results, stats)
    }
}
