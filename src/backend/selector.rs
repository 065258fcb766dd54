//! Backend selection and caching / 后端选择与缓存
//!
//! One `SearchSession` per catalog session. The first `get()` probes the
//! backends in preference order and caches the winner; later calls reuse
//! it until `reset()`. `reset_excluding()` additionally leaves one backend
//! out of the next selection, so a backend whose search just failed is
//! not picked straight back up.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    BackendKind, BackendSettings, BackendStatus, CatalogBackend, CatalogTransport,
    IndexSearchBackend, StructuredQueryBackend,
};
use crate::error::SearchError;

pub struct SearchSession {
    transport: Arc<dyn CatalogTransport>,
    settings: BackendSettings,
    /// Selected backend / 当前选中的后端
    current: RwLock<Option<Arc<CatalogBackend>>>,
    /// Serializes first selection / 首次选择锁
    init_lock: Mutex<()>,
    statuses: RwLock<HashMap<BackendKind, BackendStatus>>,
    /// Last failure per backend (kind -> message) / 后端错误状态
    errors: RwLock<HashMap<BackendKind, String>>,
    /// Left out of the next selection only / 下次选择时跳过
    excluded: RwLock<Option<BackendKind>>,
    selections: AtomicU64,
}

impl SearchSession {
    pub fn new(transport: Arc<dyn CatalogTransport>, settings: BackendSettings) -> Self {
        Self {
            transport,
            settings,
            current: RwLock::new(None),
            init_lock: Mutex::new(()),
            statuses: RwLock::new(HashMap::new()),
            errors: RwLock::new(HashMap::new()),
            excluded: RwLock::new(None),
            selections: AtomicU64::new(0),
        }
    }

    /// Get the selected backend, selecting on first use / 获取后端（首次调用时选择）
    pub async fn get(&self) -> Result<Arc<CatalogBackend>, SearchError> {
        let cached = self.current.read().clone();
        if let Some(backend) = cached {
            return Ok(backend);
        }

        let _guard = self.init_lock.lock().await;

        // Another caller may have finished selection while we waited
        let cached = self.current.read().clone();
        if let Some(backend) = cached {
            return Ok(backend);
        }

        let backend = self.select().await?;
        *self.current.write() = Some(backend.clone());
        self.selections.fetch_add(1, Ordering::SeqCst);
        Ok(backend)
    }

    /// Drop the cached backend; the next `get()` selects again / 重置后端选择
    pub fn reset(&self) {
        self.clear();
        *self.excluded.write() = None;
        tracing::info!("Search backend selection reset");
    }

    /// Reset and skip `kind` during the next selection / 重置并排除指定后端
    pub fn reset_excluding(&self, kind: BackendKind) {
        self.clear();
        *self.excluded.write() = Some(kind);
        tracing::info!("Search backend selection reset, {} set aside", kind);
    }

    fn clear(&self) {
        *self.current.write() = None;
        let mut statuses = self.statuses.write();
        for status in statuses.values_mut() {
            *status = BackendStatus::Unknown;
        }
    }

    pub fn status(&self, kind: BackendKind) -> BackendStatus {
        self.statuses.read().get(&kind).copied().unwrap_or_default()
    }

    /// Last recorded failure for a backend / 获取后端错误状态
    pub fn last_error(&self, kind: BackendKind) -> Option<String> {
        self.errors.read().get(&kind).cloned()
    }

    /// Record a search failure against a backend / 记录后端错误
    pub fn record_failure(&self, kind: BackendKind, message: impl Into<String>) {
        self.errors.write().insert(kind, message.into());
    }

    pub fn any_available(&self) -> bool {
        self.statuses.read().values().any(|s| *s == BackendStatus::Available)
    }

    /// Completed selections so far / 已完成的选择次数
    pub fn selections(&self) -> u64 {
        self.selections.load(Ordering::SeqCst)
    }

    /// Candidates in preference order / 按优先级排列的候选后端
    fn candidates(&self) -> Vec<CatalogBackend> {
        vec![
            CatalogBackend::StructuredQuery(StructuredQueryBackend::new(
                self.transport.clone(),
                self.settings.clone(),
            )),
            CatalogBackend::IndexSearch(IndexSearchBackend::new(
                self.transport.clone(),
                self.settings.clone(),
            )),
        ]
    }

    async fn select(&self) -> Result<Arc<CatalogBackend>, SearchError> {
        let mut reasons = Vec::new();
        let excluded = self.excluded.write().take();

        for candidate in self.candidates() {
            let kind = candidate.kind();
            if excluded == Some(kind) {
                self.statuses.write().insert(kind, BackendStatus::Error);
                let reason = format!("{} failed its last search", kind);
                tracing::debug!("Search backend skipped: {}", reason);
                reasons.push(reason);
                continue;
            }

            self.statuses.write().insert(kind, BackendStatus::Verifying);

            let status = candidate.probe().await;
            self.statuses.write().insert(kind, status);

            if status == BackendStatus::Available {
                self.errors.write().remove(&kind);
                tracing::info!("Search backend selected: {}", kind);
                return Ok(Arc::new(candidate));
            }

            let reason = format!("{} {}", kind, describe(status));
            if status != BackendStatus::NotApplicable {
                self.errors.write().insert(kind, reason.clone());
            }
            tracing::debug!("Search backend skipped: {}", reason);
            reasons.push(reason);
        }

        tracing::warn!("No search backend available: {}", reasons.join("; "));
        Err(SearchError::BackendUnavailable(reasons.join("; ")))
    }
}

fn describe(status: BackendStatus) -> &'static str {
    match status {
        BackendStatus::Unavailable => "is unreachable",
        BackendStatus::NotApplicable => "is not part of this deployment",
        BackendStatus::Error => "failed verification",
        BackendStatus::Unknown | BackendStatus::Verifying => "was not verified",
        BackendStatus::Available => "is available",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::error::TransportError;
    use crate::test_support::{es_response, introspection_response, FakeTransport};
    use std::time::Duration;

    fn session(transport: Arc<FakeTransport>, structured: bool) -> SearchSession {
        let mut config = BackendConfig::default();
        config.structured_query_enabled = structured;
        SearchSession::new(transport, BackendSettings::from_config(&config, Some("demo")))
    }

    fn catalog_without_graphql() -> Arc<FakeTransport> {
        Arc::new(FakeTransport::new(|path, _| {
            if path == "/graphql" {
                Err(TransportError::status(404, "404 Not Found"))
            } else {
                Ok(es_response(0, vec![]))
            }
        }))
    }

    #[tokio::test]
    async fn test_cached_backend_is_reused() {
        let transport = catalog_without_graphql();
        let session = session(transport.clone(), true);

        let first = session.get().await.unwrap();
        let calls_after_selection = transport.call_count();
        let second = session.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.call_count(), calls_after_selection);
        assert_eq!(session.selections(), 1);
        assert_eq!(first.kind(), BackendKind::Elasticsearch);
        assert_eq!(session.status(BackendKind::Graphql), BackendStatus::NotApplicable);
        assert!(session.last_error(BackendKind::Graphql).is_none());
        assert!(session.any_available());
    }

    #[tokio::test]
    async fn test_structured_backend_preferred() {
        let transport = Arc::new(FakeTransport::new(|_, _| Ok(introspection_response())));
        let session = session(transport.clone(), true);
        assert_eq!(session.get().await.unwrap().kind(), BackendKind::Graphql);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(session.status(BackendKind::Elasticsearch), BackendStatus::Unknown);
    }

    #[tokio::test]
    async fn test_disabled_structured_backend_is_skipped() {
        let transport = Arc::new(FakeTransport::new(|_, _| Ok(es_response(0, vec![]))));
        let session = session(transport.clone(), false);
        assert_eq!(session.get().await.unwrap().kind(), BackendKind::Elasticsearch);
        assert!(transport.calls().iter().all(|(path, _)| path != "/graphql"));
    }

    #[tokio::test]
    async fn test_reset_forces_reselection() {
        let transport = catalog_without_graphql();
        let session = session(transport, true);

        let first = session.get().await.unwrap();
        session.reset();
        assert_eq!(session.status(BackendKind::Elasticsearch), BackendStatus::Unknown);
        assert!(!session.any_available());

        let second = session.get().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(session.selections(), 2);
    }

    #[tokio::test]
    async fn test_reset_excluding_falls_through_to_index_search() {
        let transport = Arc::new(FakeTransport::new(|path, _| {
            if path == "/graphql" {
                Ok(introspection_response())
            } else {
                Ok(es_response(0, vec![]))
            }
        }));
        let session = session(transport.clone(), true);

        assert_eq!(session.get().await.unwrap().kind(), BackendKind::Graphql);
        session.record_failure(BackendKind::Graphql, "search operation failed");

        session.reset_excluding(BackendKind::Graphql);
        let calls_before = transport.call_count();
        assert_eq!(session.get().await.unwrap().kind(), BackendKind::Elasticsearch);
        assert_eq!(session.status(BackendKind::Graphql), BackendStatus::Error);
        assert_eq!(session.last_error(BackendKind::Graphql).as_deref(), Some("search operation failed"));
        // one reachability check, against index search only
        assert_eq!(transport.call_count(), calls_before + 1);

        // the exclusion covers one selection; a plain reset prefers GraphQL again
        session.reset();
        assert_eq!(session.get().await.unwrap().kind(), BackendKind::Graphql);
        assert_eq!(session.selections(), 3);
    }

    #[tokio::test]
    async fn test_excluded_backend_counts_as_unavailable_reason() {
        let transport = Arc::new(FakeTransport::new(|path, _| {
            if path == "/graphql" {
                Ok(introspection_response())
            } else {
                Err(TransportError::connect("refused"))
            }
        }));
        let session = session(transport, true);

        session.reset_excluding(BackendKind::Graphql);
        let err = session.get().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("graphql failed its last search"));
        assert!(message.contains("elasticsearch is unreachable"));
    }

    #[tokio::test]
    async fn test_concurrent_first_selection_has_one_winner() {
        let transport = Arc::new(FakeTransport::slow(Duration::from_millis(50), introspection_response()));
        let session = Arc::new(session(transport.clone(), true));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.get().await.map(|b| b.kind()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), BackendKind::Graphql);
        }

        assert_eq!(session.selections(), 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_backend_available() {
        let transport = Arc::new(FakeTransport::new(|_, _| Err(TransportError::connect("refused"))));
        let session = session(transport, true);

        let err = session.get().await.unwrap_err();
        assert!(matches!(err, SearchError::BackendUnavailable(_)));
        let message = err.to_string();
        assert!(message.contains("graphql is unreachable"));
        assert!(message.contains("elasticsearch is unreachable"));
        assert!(!session.any_available());
        assert_eq!(session.selections(), 0);
        assert!(session.last_error(BackendKind::Elasticsearch).is_some());
    }
}
