//! Wire-shape tests for herd-core types stored in the shared cache.

use chrono::{TimeZone, Utc};
use herd_core::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_negative_entry_shape() {
    let entry = make_negative("Item 42 not found", "NOT_FOUND", 404).expect("cacheable");

    let value = serde_json::to_value(&entry).expect("serialize");
    assert_eq!(
        value,
        json!({
            "__negative": true,
            "error": "Item 42 not found",
            "code": "NOT_FOUND",
            "status": 404,
        })
    );
    assert_eq!(value, entry.to_value());
}

#[test]
fn test_negative_entry_roundtrip_through_bytes() {
    let entry = make_negative("bad id", "VALIDATION", 422).expect("cacheable");
    let bytes = serde_json::to_vec(&entry.to_value()).expect("serialize");

    let parsed: serde_json::Value = serde_json::from_slice(&bytes).expect("deserialize");
    assert!(is_negative(&parsed));
    assert_eq!(NegativeCacheEntry::from_value(&parsed), Some(entry.clone()));
    assert_eq!(entry.to_upstream(), UpstreamError::new("bad id", "VALIDATION", 422));
}

#[test]
fn test_durable_record_shape() {
    let updated_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let record = DurableRecord::new(json!({"title": "Dune"}), updated_at);

    let value = serde_json::to_value(&record).expect("serialize");
    assert_eq!(
        value,
        json!({
            "payload": {"title": "Dune"},
            "updatedAt": "2024-05-01T12:00:00Z",
        })
    );
}

#[test]
fn test_upstream_error_shape() {
    let err = UpstreamError::new("upstream exploded", "UPSTREAM", 502);
    let value = serde_json::to_value(&err).expect("serialize");
    assert_eq!(
        value,
        json!({"message": "upstream exploded", "code": "UPSTREAM", "status": 502})
    );
    assert!(err.is_transient());
}
