//! Search configuration module / 搜索配置模块
//!
//! Loaded from a JSON file; every field has a default so a partial file
//! (or no file at all) is valid / 所有字段均有默认值

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::SearchError;

/// Search configuration / 搜索配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Catalog connection / 目录连接配置
    pub catalog: CatalogConfig,
    /// Backend configuration / 后端配置
    pub backends: BackendConfig,
    /// Known storage locations / 存储位置配置
    pub locations: LocationConfig,
    /// Request limits / 请求限制
    pub limits: LimitConfig,
}

/// Catalog connection / 目录连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog registry endpoint, e.g. https://registry.example.com
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token / 令牌所在的环境变量
    pub token_env: String,
}

/// Backend configuration / 后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Per-call timeout (milliseconds) / 单次调用超时
    pub timeout_ms: u64,
    /// Search proxy path of the index backend / 索引搜索代理路径
    pub index_search_path: String,
    /// GraphQL path of the structured backend / GraphQL路径
    pub graphql_path: String,
    /// Whether to try the structured backend at all / 是否启用结构化查询后端
    pub structured_query_enabled: bool,
    /// Suffix of package-metadata indices / 包索引后缀
    pub package_index_suffix: String,
}

/// Storage locations / 存储位置配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Buckets searched when the request names none / 默认搜索的桶
    pub known: Vec<String>,
    /// Single known-accessible bucket used for fallback-narrowing / 回退用的桶
    pub default: Option<String>,
}

/// Request limits / 请求限制
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Characters kept in `content_preview` / 内容预览字符数
    pub content_preview_chars: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token_env: "CATALOG_TOKEN".to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            index_search_path: "/api/search".to_string(),
            graphql_path: "/graphql".to_string(),
            structured_query_enabled: true,
            package_index_suffix: "_packages".to_string(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 1000,
            content_preview_chars: 200,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SearchConfig {
    /// Apply `CATALOG_URL` / `CATALOG_DEFAULT_BUCKET` overrides / 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CATALOG_URL") {
            if !url.trim().is_empty() {
                self.catalog.endpoint = Some(url.trim().to_string());
            }
        }
        if let Ok(bucket) = std::env::var("CATALOG_DEFAULT_BUCKET") {
            let bucket = crate::utils::normalize_location(&bucket);
            if !bucket.is_empty() {
                self.locations.default = Some(bucket);
            }
        }
    }
}

/// Load configuration from file, or defaults if it does not exist / 加载配置文件，不存在则使用默认配置
pub fn load_config(path: &Path) -> Result<SearchConfig, SearchError> {
    if !path.exists() {
        tracing::info!("No configuration at {:?}, using defaults", path);
        return Ok(SearchConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| SearchError::configuration(format!("Failed to read config file: {}", e)))?;

    let config: SearchConfig = serde_json::from_str(&content)
        .map_err(|e| SearchError::configuration(format!("Failed to parse config file: {}", e)))?;

    tracing::info!("Loaded configuration from {:?}", path);
    Ok(config)
}
