//! Error classification / 错误分类
//!
//! Structured status codes decide first; message heuristics only apply
//! when the transport exposed no usable status.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ErrorCategory, SearchError, TransportError, TransportErrorKind};

/// What the orchestrator does with a failure / 失败处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Surface immediately, never retried
    FailFast,
    /// Retry once against the default location when the query spans several
    FallbackNarrow,
    /// Reset backend selection and retry once
    ResetAndRetry,
    /// Surface as is
    Surface,
}

/// Remediation hint / 修复建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fix {
    pub required_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub category: ErrorCategory,
    pub disposition: Disposition,
    pub cause: String,
    pub fix: Fix,
}

const AUTHORIZATION_MARKERS: &[&str] = &[
    "403",
    "forbidden",
    "security_exception",
    "access denied",
    "index_not_found",
    "no such index",
];
const AUTHENTICATION_MARKERS: &[&str] = &["401", "unauthorized", "unauthenticated", "not logged in"];
const NETWORK_MARKERS: &[&str] = &["timed out", "timeout", "connection", "unreachable", "503", "502"];

#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, err: &SearchError) -> Classification {
        let category = self.category(err);
        let disposition = match (err, category) {
            (SearchError::Internal(_), _) => Disposition::Surface,
            (_, ErrorCategory::Configuration | ErrorCategory::Authentication) => Disposition::FailFast,
            (_, ErrorCategory::Authorization) => Disposition::FallbackNarrow,
            (_, ErrorCategory::Network | ErrorCategory::Unknown) => Disposition::ResetAndRetry,
            (_, ErrorCategory::NotApplicable) => Disposition::Surface,
        };

        Classification {
            category,
            disposition,
            cause: cause(err, category),
            fix: fix(category, err),
        }
    }

    pub fn category(&self, err: &SearchError) -> ErrorCategory {
        match err {
            SearchError::Configuration(_) => ErrorCategory::Configuration,
            SearchError::Authentication(_) => ErrorCategory::Authentication,
            SearchError::NotApplicable(_) => ErrorCategory::NotApplicable,
            SearchError::BackendUnavailable(_) => ErrorCategory::Network,
            SearchError::Internal(_) => ErrorCategory::Unknown,
            SearchError::Backend { source, .. } => categorize_transport(source),
        }
    }

    /// Alternative tools named in error responses (tool name -> description) / 替代工具
    pub fn alternatives(&self, category: ErrorCategory) -> BTreeMap<String, String> {
        let entries: &[(&str, &str)] = match category {
            ErrorCategory::Authentication => &[
                ("catalog_login", "Authenticate against the catalog before searching"),
                ("catalog_status", "Show the current catalog endpoint and session state"),
            ],
            ErrorCategory::Authorization => &[
                ("bucket_access_check", "List the buckets this session can read"),
                ("bucket_objects_list", "List objects in a bucket you can access (no full-text search)"),
            ],
            ErrorCategory::Network => &[
                ("catalog_status", "Check catalog connectivity and backend health"),
            ],
            ErrorCategory::Configuration => &[
                ("search_explain", "Re-run the search with explain=true to inspect the generated query"),
            ],
            ErrorCategory::NotApplicable | ErrorCategory::Unknown => &[
                ("bucket_objects_list", "List objects in a bucket directly (no full-text search)"),
                ("package_browse", "Browse the contents of a known package"),
            ],
        };
        entries
            .iter()
            .map(|(name, desc)| (name.to_string(), desc.to_string()))
            .collect()
    }
}

fn categorize_transport(err: &TransportError) -> ErrorCategory {
    if matches!(err.kind, TransportErrorKind::Timeout | TransportErrorKind::Connect) {
        return ErrorCategory::Network;
    }

    let message = err.message.to_lowercase();
    match err.status {
        Some(401) => return ErrorCategory::Authentication,
        Some(403) => return ErrorCategory::Authorization,
        Some(404) if message.contains("index_not_found") || message.contains("no such index") => {
            return ErrorCategory::Authorization
        }
        Some(408 | 429) | Some(500..=599) => return ErrorCategory::Network,
        _ => {}
    }

    if AUTHORIZATION_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::Authorization
    } else if AUTHENTICATION_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::Authentication
    } else if NETWORK_MARKERS.iter().any(|m| message.contains(m)) {
        ErrorCategory::Network
    } else {
        ErrorCategory::Unknown
    }
}

fn cause(err: &SearchError, category: ErrorCategory) -> String {
    match (err, category) {
        (SearchError::Backend { source, .. }, ErrorCategory::Authorization) => {
            format!("The catalog denied access to one or more search targets: {}", source)
        }
        (SearchError::Backend { backend, source }, ErrorCategory::Network) => {
            format!("The {} backend could not be reached: {}", backend, source)
        }
        (SearchError::BackendUnavailable(reasons), _) => {
            format!("No search backend passed verification ({})", reasons)
        }
        _ => err.to_string(),
    }
}

fn fix(category: ErrorCategory, err: &SearchError) -> Fix {
    let (action, command) = match category {
        ErrorCategory::Authentication => (
            "Log in to the catalog and retry the search".to_string(),
            Some("export CATALOG_TOKEN=<token>".to_string()),
        ),
        ErrorCategory::Authorization => (
            "Search a bucket this session can read, or request read access to the bucket".to_string(),
            None,
        ),
        ErrorCategory::NotApplicable => (
            "This catalog does not provide the requested capability; use the index search instead"
                .to_string(),
            None,
        ),
        ErrorCategory::Network => (
            "Check that the catalog endpoint is reachable, then retry".to_string(),
            Some("curl -sI $CATALOG_URL".to_string()),
        ),
        ErrorCategory::Configuration => (format!("Fix the request: {}", err), None),
        ErrorCategory::Unknown => (
            "Retry with explain=true and report the error if it persists".to_string(),
            None,
        ),
    };
    Fix { required_action: action, command, documentation: None }
}
