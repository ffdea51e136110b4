//! Cache key helpers.

use sha2::{Digest, Sha256};

/// Suffix appended to a cache key to form its lock key.
pub const LOCK_SUFFIX: &str = ":_lock";

/// Lock key guarding the fetch of `cache_key`.
pub fn lock_key(cache_key: &str) -> String {
    format!("{}{}", cache_key, LOCK_SUFFIX)
}

/// Prefix a key with a namespace, e.g. `books` + `isbn:123` -> `books:isbn:123`.
pub fn namespaced(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}

/// Short, stable key for arbitrary input (query strings, filter sets).
pub fn hashed_key(namespace: &str, input: &str) -> String {
    let hash = Sha256::digest(input.as_bytes());
    namespaced(namespace, &hex::encode(&hash[..8]))
}

/// Replace characters that break key-space conventions.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            ' ' | '\t' | '\n' | '\r' | '*' | '?' | '[' | ']' => '_',
            _ => c,
        })
        .collect()
}
