//! Error types for catalog search / 目录搜索错误类型

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendKind;

/// User-facing error category / 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No valid session / 未登录
    Authentication,
    /// Session valid but access denied / 无权限
    Authorization,
    /// Capability absent in this deployment / 当前部署不支持
    NotApplicable,
    /// Timeout or connectivity / 网络错误
    Network,
    /// Malformed request / 请求参数错误
    Configuration,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::NotApplicable => "not_applicable",
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// How a transport call failed / 传输层失败方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Per-call timeout elapsed
    Timeout,
    /// Could not reach the endpoint at all
    Connect,
    /// Non-success HTTP status
    Status,
    /// Response body was not the expected JSON
    Decode,
    /// Error payload inside an otherwise successful response
    Upstream,
}

/// Failure reported by one backend call / 单次后端调用失败
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// HTTP (or payload-reported) status when the transport exposes one
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn timeout(after_ms: u64) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            status: None,
            message: format!("backend call timed out after {} ms", after_ms),
        }
    }

    pub fn connect(msg: impl Into<String>) -> Self {
        Self { kind: TransportErrorKind::Connect, status: None, message: msg.into() }
    }

    pub fn status(code: u16, msg: impl Into<String>) -> Self {
        Self { kind: TransportErrorKind::Status, status: Some(code), message: msg.into() }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self { kind: TransportErrorKind::Decode, status: None, message: msg.into() }
    }

    pub fn upstream(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self { kind: TransportErrorKind::Upstream, status, message: msg.into() }
    }
}

/// Catalog search errors / 目录搜索错误
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Malformed request; never retried.
    #[error("invalid search request: {0}")]
    Configuration(String),

    /// No usable session; never retried.
    #[error("not authenticated: {0}")]
    Authentication(String),

    /// Neither backend passed verification.
    #[error("no search backend available: {0}")]
    BackendUnavailable(String),

    /// A backend call failed.
    #[error("{backend} search failed: {source}")]
    Backend {
        backend: BackendKind,
        #[source]
        source: TransportError,
    },

    /// Requested capability is not part of this deployment.
    #[error("not available in this deployment: {0}")]
    NotApplicable(String),

    #[error("unexpected search failure: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn backend(backend: BackendKind, source: TransportError) -> Self {
        Self::Backend { backend, source }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Underlying transport failure, if any / 底层传输错误
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SearchError::backend(
            BackendKind::Elasticsearch,
            TransportError::status(403, "403 Forbidden"),
        );
        assert_eq!(err.to_string(), "elasticsearch search failed: 403 Forbidden");
        assert_eq!(err.transport().and_then(|t| t.status), Some(403));

        let err = SearchError::configuration("location is required");
        assert_eq!(err.to_string(), "invalid search request: location is required");
        assert!(err.transport().is_none());
    }

    #[test]
    fn test_category_names() {
        assert_eq!(ErrorCategory::NotApplicable.as_str(), "not_applicable");
        assert_eq!(
            serde_json::to_value(ErrorCategory::Authorization).unwrap(),
            serde_json::json!("authorization")
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = TransportError::timeout(250);
        assert_eq!(err.kind, TransportErrorKind::Timeout);
        assert!(err.message.contains("250 ms"));
    }
}
