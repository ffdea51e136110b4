//! Negative cache marker.
//!
//! A cached failure is stored as a JSON object carrying a reserved marker
//! field so it can share the key space with positive entries.

use crate::error::{UpstreamError, is_client_status};
use serde::{Deserialize, Serialize};

/// Reserved field name that tags a cached failure.
pub const NEGATIVE_MARKER: &str = "__negative";

/// Fixed TTL for negative entries, independent of positive TTL policy.
pub const NEGATIVE_TTL_SECONDS: u64 = 60;

/// A cached request-attributable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeCacheEntry {
    #[serde(rename = "__negative")]
    marker: bool,
    pub error: String,
    pub code: String,
    pub status: u16,
}

impl NegativeCacheEntry {
    /// Build a negative entry. Returns `None` for statuses that must never be
    /// cached (anything that is not a 4xx-equivalent client error).
    pub fn new(message: impl Into<String>, code: impl Into<String>, status: u16) -> Option<Self> {
        if !is_client_status(status) {
            return None;
        }
        Some(Self {
            marker: true,
            error: message.into(),
            code: code.into(),
            status,
        })
    }

    pub fn from_upstream(err: &UpstreamError) -> Option<Self> {
        Self::new(err.message.clone(), err.code.clone(), err.status)
    }

    pub fn to_upstream(&self) -> UpstreamError {
        UpstreamError::new(self.error.clone(), self.code.clone(), self.status)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            NEGATIVE_MARKER: true,
            "error": self.error,
            "code": self.code,
            "status": self.status,
        })
    }

    /// Parse a cached value; `None` unless it is a well-formed negative entry.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if !is_negative(value) {
            return None;
        }
        serde_json::from_value::<Self>(value.clone())
            .ok()
            .filter(|entry| is_client_status(entry.status))
    }
}

/// See [`NegativeCacheEntry::new`].
pub fn make_negative(
    message: impl Into<String>,
    code: impl Into<String>,
    status: u16,
) -> Option<NegativeCacheEntry> {
    NegativeCacheEntry::new(message, code, status)
}

/// Whether a cached value is tagged as a failure.
pub fn is_negative(value: &serde_json::Value) -> bool {
    value
        .get(NEGATIVE_MARKER)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_make_negative_client_error() {
        let entry = make_negative("no such item", "NOT_FOUND", 404).unwrap();
        let value = entry.to_value();
        assert!(is_negative(&value));
        assert_eq!(value["status"], 404);
        assert_eq!(NegativeCacheEntry::from_value(&value), Some(entry));
    }

    #[test]
    fn test_make_negative_rejects_transient() {
        assert!(make_negative("down", "UNAVAILABLE", 503).is_none());
        assert!(make_negative("timeout", "TIMEOUT", 408).is_none());
        assert!(make_negative("slow down", "RATE_LIMITED", 429).is_none());
    }

    #[test]
    fn test_is_negative_on_positive_values() {
        assert!(!is_negative(&json!({"name": "widget"})));
        assert!(!is_negative(&json!({"__negative": false})));
        assert!(!is_negative(&json!([1, 2, 3])));
        assert!(!is_negative(&json!("__negative")));
    }

    #[test]
    fn test_from_value_rejects_forged_status() {
        let forged = json!({"__negative": true, "error": "x", "code": "X", "status": 500});
        assert!(is_negative(&forged));
        assert!(NegativeCacheEntry::from_value(&forged).is_none());
    }
}
