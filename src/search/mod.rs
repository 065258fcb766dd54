//! Search core - routes a query to one backend and normalizes results / 搜索核心
//!
//! Architecture principles / 架构原则：
//! - Scope handlers decide targets, filters and which documents they accept
//! - Backends only execute; the orchestrator owns retry and fallback / 后端只执行
//! - Call direction: orchestrator → scope handler / backend (unidirectional) / 调用方向

pub mod classify;
pub mod escape;
pub mod normalize;
pub mod orchestrator;
pub mod schema;
pub mod scope;
pub mod types;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SearchError;

pub use classify::{Disposition, ErrorClassifier};
pub use normalize::{Confidence, NormalizeStats, ResultNormalizer};
pub use orchestrator::CatalogSearch;
pub use schema::{ResultType, SearchResult};
pub use scope::{ScopeHandler, ScopeHandlers};
pub use types::{SearchFailure, SearchRequest, SearchResponse, SearchSuccess};

/// Search scope / 搜索范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Files and packages across all locations / 全局
    Global,
    /// Package manifests only / 仅包
    Packages,
    /// Files in one location; requires a location / 单个桶
    Bucket,
    /// Files in the given location, or in all locations / 文件
    File,
}

impl Scope {
    pub fn parse(scope: &str) -> Result<Self, SearchError> {
        match scope.trim().to_lowercase().as_str() {
            "global" | "" => Ok(Scope::Global),
            "packages" => Ok(Scope::Packages),
            "bucket" => Ok(Scope::Bucket),
            "file" => Ok(Scope::File),
            other => Err(SearchError::configuration(format!(
                "unknown scope '{}', expected one of global, packages, bucket, file",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Packages => "packages",
            Scope::Bucket => "bucket",
            Scope::File => "file",
        }
    }

    /// Scopes whose multi-location failures may be narrowed / 可回退缩小范围
    pub fn allows_narrowing(&self) -> bool {
        matches!(self, Scope::Global | Scope::Packages)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("global").unwrap(), Scope::Global);
        assert_eq!(Scope::parse("Packages").unwrap(), Scope::Packages);
        assert_eq!(Scope::parse(" bucket ").unwrap(), Scope::Bucket);
        assert_eq!(Scope::parse("file").unwrap(), Scope::File);
        assert!(matches!(Scope::parse("everything"), Err(SearchError::Configuration(_))));
    }

    #[test]
    fn test_narrowing_scopes() {
        assert!(Scope::Global.allows_narrowing());
        assert!(Scope::Packages.allows_narrowing());
        assert!(!Scope::Bucket.allows_narrowing());
        assert!(!Scope::File.allows_narrowing());
    }
}
