//! Error types for herd.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure reported by the remote source (or mapped onto its shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamError {
    pub message: String,
    pub code: String,
    pub status: u16,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            status,
        }
    }

    /// Request-attributable failure: bad input, not found, validation.
    ///
    /// 408 (timeout) and 429 (rate limited) sit in the 4xx range but are
    /// transient and therefore excluded.
    pub fn is_client_error(&self) -> bool {
        is_client_status(self.status)
    }

    /// Server-side, timeout or rate-limit failure.
    pub fn is_transient(&self) -> bool {
        !self.is_client_error()
    }
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} {})", self.message, self.status, self.code)
    }
}

/// Whether a status is a 4xx-equivalent that may be negative-cached.
pub fn is_client_status(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cache or lock backend unreachable. Recovered locally.
    BackendUnavailable,
    /// 4xx-equivalent failure of the remote source.
    UpstreamClient,
    /// 5xx, timeout, rate limit, or any internal failure.
    UpstreamTransient,
    /// The caller's cancellation token fired.
    Cancelled,
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(UpstreamError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for an upstream failure.
    pub fn upstream(message: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Error::Upstream(UpstreamError::new(message, code, status))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Upstream(e) if e.is_client_error() => ErrorKind::UpstreamClient,
            _ => ErrorKind::UpstreamTransient,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Map onto the `{message, code, status}` shape returned to callers.
    pub fn to_upstream(&self) -> UpstreamError {
        match self {
            Error::Upstream(e) => e.clone(),
            Error::Cancelled => UpstreamError::new(self.to_string(), "CANCELLED", 499),
            Error::BackendUnavailable(_) => {
                UpstreamError::new(self.to_string(), "BACKEND_UNAVAILABLE", 503)
            }
            _ => UpstreamError::new(self.to_string(), "INTERNAL", 500),
        }
    }
}

impl From<UpstreamError> for Error {
    fn from(err: UpstreamError) -> Self {
        Error::Upstream(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_status_classification() {
        assert!(is_client_status(400));
        assert!(is_client_status(404));
        assert!(is_client_status(422));
        assert!(!is_client_status(408));
        assert!(!is_client_status(429));
        assert!(!is_client_status(500));
        assert!(!is_client_status(503));
        assert!(!is_client_status(200));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            Error::upstream("bad", "BAD_INPUT", 400).kind(),
            ErrorKind::UpstreamClient
        );
        assert_eq!(
            Error::upstream("down", "UNAVAILABLE", 503).kind(),
            ErrorKind::UpstreamTransient
        );
        assert_eq!(
            Error::upstream("slow down", "RATE_LIMITED", 429).kind(),
            ErrorKind::UpstreamTransient
        );
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            Error::BackendUnavailable("refused".into()).kind(),
            ErrorKind::BackendUnavailable
        );
        assert_eq!(
            Error::Internal("boom".into()).kind(),
            ErrorKind::UpstreamTransient
        );
    }

    #[test]
    fn test_to_upstream_mapping() {
        let mapped = Error::Internal("boom".into()).to_upstream();
        assert_eq!(mapped.status, 500);
        assert_eq!(mapped.code, "INTERNAL");

        let original = UpstreamError::new("missing", "NOT_FOUND", 404);
        assert_eq!(Error::Upstream(original.clone()).to_upstream(), original);
    }
}
