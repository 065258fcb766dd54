//! Search orchestrator - the single entry point of the search core / 搜索编排
//!
//! Flow: validate → resolve locations → select backend → build query →
//! execute → (on failure) classify and recover once → normalize.

use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use super::classify::{Disposition, ErrorClassifier};
use super::escape::{escape, is_match_all};
use super::normalize::{Confidence, NormalizeStats, ResultNormalizer};
use super::schema::RawSearchPage;
use super::scope::{ParseContext, ScopeHandler, ScopeHandlers};
use super::types::{ErrorDetails, SearchFailure, SearchRequest, SearchResponse, SearchSuccess};
use super::Scope;
use crate::backend::{
    BackendKind, BackendQuery, BackendSettings, CatalogBackend, HttpTransport, SearchSession,
};
use crate::config::SearchConfig;
use crate::error::{ErrorCategory, SearchError};
use crate::session::{CatalogSession, LocationProvider, StaticLocations, StaticSession};
use crate::utils::normalize_location;

/// Validated request / 校验后的请求
struct SearchPlan<'a> {
    handler: &'a dyn ScopeHandler,
    /// Normalized explicit location, empty when none was given
    location: String,
    limit: usize,
    escaped: String,
}

/// What recovery did for one request / 恢复过程记录
#[derive(Debug, Default)]
struct RecoveryFacts {
    narrowed_to: Option<String>,
    retried: bool,
    recovered_from: Option<String>,
}

type Executed = (Arc<CatalogBackend>, RawSearchPage, BackendQuery);

pub struct CatalogSearch {
    config: SearchConfig,
    session: Arc<dyn CatalogSession>,
    locations: Arc<dyn LocationProvider>,
    backends: Arc<SearchSession>,
    handlers: ScopeHandlers,
    classifier: ErrorClassifier,
}

impl CatalogSearch {
    pub fn new(
        config: SearchConfig,
        session: Arc<dyn CatalogSession>,
        locations: Arc<dyn LocationProvider>,
        backends: Arc<SearchSession>,
    ) -> Self {
        let handlers = ScopeHandlers::new(&config.backends.package_index_suffix);
        Self {
            config,
            session,
            locations,
            backends,
            handlers,
            classifier: ErrorClassifier::new(),
        }
    }

    /// Wire the HTTP stack from configuration / 根据配置构建
    pub fn from_config(config: SearchConfig) -> Result<Self, SearchError> {
        let session: Arc<dyn CatalogSession> = Arc::new(StaticSession::from_config(&config));
        let locations = StaticLocations::from_config(&config);

        let transport = HttpTransport::new(session.clone(), config.backends.timeout())
            .map_err(|e| SearchError::configuration(e.to_string()))?;
        let settings =
            BackendSettings::from_config(&config.backends, locations.default_location().as_deref());
        let backends = Arc::new(SearchSession::new(Arc::new(transport), settings));

        Ok(Self::new(config, session, Arc::new(locations), backends))
    }

    pub fn backends(&self) -> &Arc<SearchSession> {
        &self.backends
    }

    /// Run a search and always answer with a response / 执行搜索
    pub async fn search(&self, request: SearchRequest) -> SearchResponse {
        match self.try_search(&request).await {
            Ok(success) => SearchResponse::Success(success),
            Err(err) => SearchResponse::Failure(self.failure(&err)),
        }
    }

    pub async fn try_search(&self, request: &SearchRequest) -> Result<SearchSuccess, SearchError> {
        let started = Instant::now();

        if !self.session.is_authenticated() {
            return Err(SearchError::authentication("no authenticated catalog session"));
        }

        let plan = self.plan(request)?;
        let locations = self.resolve_locations(&plan).await?;
        let targets = plan.handler.build_targets(&locations)?;
        let query = BackendQuery {
            entity_types: plan.handler.expected_result_types().to_vec(),
            targets,
            filter: plan.handler.build_query_filter(&plan.escaped),
            limit: plan.limit,
            count_only: request.count_only,
        };

        tracing::debug!(
            "Searching: scope={}, targets={}, query={}",
            plan.handler.scope(),
            query.targets.pattern,
            plan.escaped
        );

        let mut facts = RecoveryFacts::default();
        let (backend, page, query) = match self.execute(&query).await {
            Ok((backend, page)) => (backend, page, query),
            Err(original) => self.recover(&plan, query, original, &mut facts).await?,
        };

        let mut warnings = Vec::new();
        if let Some(location) = &facts.narrowed_to {
            warnings.push(format!(
                "Access to the full search target was denied; results are limited to location '{}'",
                location
            ));
        }

        let (results, stats) = if request.count_only {
            (Vec::new(), NormalizeStats::default())
        } else {
            let ctx = ParseContext {
                backend: backend.kind(),
                include_metadata: request.include_metadata,
                preview_chars: request
                    .include_content_preview
                    .then_some(self.config.limits.content_preview_chars),
            };
            let normalizer =
                ResultNormalizer::new(plan.handler, ctx, &self.config.backends.package_index_suffix);
            let (mut results, stats) = normalizer.normalize(&page);
            results.truncate(plan.limit);
            (results, stats)
        };

        let confidence = stats.confidence();
        if confidence == Confidence::Reduced {
            warnings.push(format!(
                "None of the {} hits returned by the backend could be parsed; results may be incomplete",
                stats.hits
            ));
        }

        let explanation = request.explain.then(|| {
            json!({
                "backend": backend.kind(),
                "handler": plan.handler.name(),
                "scope": plan.handler.scope(),
                "targets": query.targets,
                "escaped_query": plan.escaped,
                "match_all": is_match_all(&plan.escaped),
                "filter": query.filter.to_json(),
                "limit": plan.limit,
                "count_only": request.count_only,
                "narrowed_to": facts.narrowed_to,
                "retried_after_reset": facts.retried,
                "recovered_from": facts.recovered_from,
                "normalization": stats,
            })
        });

        let query_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            "Search completed: scope={}, backend={}, results={}, total={}, {:.1} ms",
            plan.handler.scope(),
            backend.kind(),
            results.len(),
            page.total,
            query_time_ms
        );

        Ok(SearchSuccess {
            success: true,
            query: request.query.clone(),
            scope: plan.handler.scope().as_str().to_string(),
            location: facts.narrowed_to.clone().unwrap_or(plan.location),
            backend_used: backend.kind(),
            results,
            total: page.total,
            query_time_ms,
            confidence,
            warnings,
            explanation,
        })
    }

    /// Validate the request; no backend is touched here / 校验请求
    fn plan(&self, request: &SearchRequest) -> Result<SearchPlan<'_>, SearchError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::configuration(
                "query must not be empty; use '*' to match everything",
            ));
        }

        let scope = Scope::parse(&request.scope)?;
        let location = normalize_location(&request.location);
        if scope == Scope::Bucket && location.is_empty() {
            return Err(SearchError::configuration("scope 'bucket' requires a location"));
        }

        let limit = request.limit.unwrap_or(self.config.limits.default_limit);
        let max_limit = self.config.limits.max_limit;
        if limit == 0 || limit > max_limit {
            return Err(SearchError::configuration(format!(
                "limit must be between 1 and {}, got {}",
                max_limit, limit
            )));
        }

        Ok(SearchPlan {
            handler: self.handlers.get(scope),
            location,
            limit,
            escaped: escape(query),
        })
    }

    /// Explicit location, or every accessible location / 解析目标位置
    async fn resolve_locations(&self, plan: &SearchPlan<'_>) -> Result<BTreeSet<String>, SearchError> {
        if !plan.location.is_empty() {
            return Ok(BTreeSet::from([plan.location.clone()]));
        }
        let locations = self.locations.accessible_locations().await?;
        Ok(locations
            .iter()
            .map(|l| normalize_location(l))
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn execute(
        &self,
        query: &BackendQuery,
    ) -> Result<(Arc<CatalogBackend>, RawSearchPage), SearchError> {
        let backend = self.backends.get().await?;
        match backend.search(query).await {
            Ok(page) => Ok((backend, page)),
            Err(e) => {
                self.backends.record_failure(backend.kind(), e.to_string());
                Err(e)
            }
        }
    }

    /// One recovery attempt; the original error wins if it fails / 单次恢复
    async fn recover(
        &self,
        plan: &SearchPlan<'_>,
        query: BackendQuery,
        original: SearchError,
        facts: &mut RecoveryFacts,
    ) -> Result<Executed, SearchError> {
        let classification = self.classifier.classify(&original);
        tracing::warn!(
            "Search failed with {} error: {}",
            classification.category.as_str(),
            original
        );
        facts.recovered_from = Some(original.to_string());

        match classification.disposition {
            Disposition::FailFast | Disposition::Surface => Err(original),
            Disposition::FallbackNarrow => match self.narrowed(plan, &query) {
                Some((location, narrowed)) => {
                    tracing::warn!(
                        "Narrowing {} search from {} to default location '{}'",
                        plan.handler.scope(),
                        query.targets.pattern,
                        location
                    );
                    match self.execute(&narrowed).await {
                        Ok((backend, page)) => {
                            facts.narrowed_to = Some(location);
                            Ok((backend, page, narrowed))
                        }
                        Err(retry_err) => {
                            tracing::warn!("Narrowed retry failed: {}", retry_err);
                            Err(original)
                        }
                    }
                }
                None => self.reset_and_retry(query, original, facts).await,
            },
            Disposition::ResetAndRetry => self.reset_and_retry(query, original, facts).await,
        }
    }

    /// A failed structured search retries on index search, anything else
    /// re-selects from scratch / 重置后重试一次
    async fn reset_and_retry(
        &self,
        query: BackendQuery,
        original: SearchError,
        facts: &mut RecoveryFacts,
    ) -> Result<Executed, SearchError> {
        facts.retried = true;
        match &original {
            SearchError::Backend { backend: BackendKind::Graphql, .. } => {
                self.backends.reset_excluding(BackendKind::Graphql)
            }
            _ => self.backends.reset(),
        }

        match self.execute(&query).await {
            Ok((backend, page)) => Ok((backend, page, query)),
            Err(retry_err) => {
                tracing::warn!("Retry after backend reset failed: {}", retry_err);
                Err(original)
            }
        }
    }

    /// Same query against the default location only / 缩小到默认位置
    fn narrowed(&self, plan: &SearchPlan<'_>, query: &BackendQuery) -> Option<(String, BackendQuery)> {
        if !plan.handler.scope().allows_narrowing() || !query.targets.is_multi_location() {
            return None;
        }
        let location = self
            .locations
            .default_location()
            .map(|l| normalize_location(&l))
            .filter(|l| !l.is_empty())?;
        let targets = plan
            .handler
            .build_targets(&BTreeSet::from([location.clone()]))
            .ok()?;
        Some((location, BackendQuery { targets, ..query.clone() }))
    }

    /// Build the user-facing error response / 构建错误响应
    fn failure(&self, err: &SearchError) -> SearchFailure {
        let classification = self.classifier.classify(err);
        if classification.category == ErrorCategory::Unknown {
            tracing::error!("Search failed unexpectedly: {}", err);
        }

        SearchFailure {
            success: false,
            error: err.to_string(),
            error_category: classification.category,
            details: ErrorDetails {
                cause: classification.cause,
                authenticated: self.session.is_authenticated(),
                catalog_reachable: classification.category != ErrorCategory::Network,
            },
            fix: classification.fix,
            alternatives: self.classifier.alternatives(classification.category),
        }
    }
}
