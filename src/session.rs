//! External collaborators: catalog session and storage locations / 会话与存储位置

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::utils::normalize_location;

/// Already-authenticated catalog session / 已认证的目录会话
pub trait CatalogSession: Send + Sync {
    fn is_authenticated(&self) -> bool;

    /// Registry endpoint of the current catalog, if any / 当前目录地址
    fn current_endpoint(&self) -> Option<String>;

    /// Bearer token for backend calls / 访问令牌
    fn access_token(&self) -> Option<String>;
}

/// Source of searchable storage locations / 可搜索的存储位置
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Buckets searched when the request names none / 所有可访问的桶
    async fn accessible_locations(&self) -> Result<Vec<String>, SearchError>;

    /// Single known-accessible bucket for fallback-narrowing / 回退用的桶
    fn default_location(&self) -> Option<String>;
}

/// Session built from config and environment / 基于配置和环境变量的会话
#[derive(Debug, Clone)]
pub struct StaticSession {
    endpoint: Option<String>,
    token: Option<String>,
}

impl StaticSession {
    pub fn new(endpoint: Option<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Endpoint from config, token from the configured environment variable
    pub fn from_config(config: &SearchConfig) -> Self {
        let token = std::env::var(&config.catalog.token_env).ok();
        Self::new(config.catalog.endpoint.clone(), token)
    }
}

impl CatalogSession for StaticSession {
    fn is_authenticated(&self) -> bool {
        self.endpoint.is_some() && self.token.is_some()
    }

    fn current_endpoint(&self) -> Option<String> {
        self.endpoint.clone()
    }

    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Fixed location list / 固定的位置列表
#[derive(Debug, Clone, Default)]
pub struct StaticLocations {
    locations: Vec<String>,
    default: Option<String>,
}

impl StaticLocations {
    pub fn new(locations: Vec<String>, default: Option<String>) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for location in locations.iter().map(|l| normalize_location(l)) {
            if !location.is_empty() && !normalized.contains(&location) {
                normalized.push(location);
            }
        }
        let default = default.map(|d| normalize_location(&d)).filter(|d| !d.is_empty());
        Self { locations: normalized, default }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.locations.known.clone(), config.locations.default.clone())
    }
}

#[async_trait]
impl LocationProvider for StaticLocations {
    async fn accessible_locations(&self) -> Result<Vec<String>, SearchError> {
        Ok(self.locations.clone())
    }

    fn default_location(&self) -> Option<String> {
        self.default.clone().or_else(|| self.locations.first().cloned())
    }
}
