//! Tests for the Key Encoder
//!
//! These tests verify:
//! - Wire key layout and determinism
//! - Injectivity across versions and keys
//! - Rejection of empty and oversized keys
//! - Per-key version and prefix overrides

use std::collections::HashSet;

use shardcache::key::{encode_key, CacheKey, KeyEncoder};
use shardcache::CacheError;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_encoder() -> KeyEncoder {
    KeyEncoder::new("app", 1, 64)
}

// =============================================================================
// Layout & Determinism Tests
// =============================================================================

#[test]
fn test_wire_key_layout() {
    assert_eq!(encode_key("app", 3, "user:42", 1024).unwrap(), "app:3:user:42");
    assert_eq!(encode_key("", 1, "k", 1024).unwrap(), ":1:k");
    assert_eq!(encode_key("p", -2, "k", 1024).unwrap(), "p:-2:k");
}

#[test]
fn test_encoding_is_deterministic() {
    let first = encode_key("app", 7, "session", 1024).unwrap();
    for _ in 0..100 {
        assert_eq!(encode_key("app", 7, "session", 1024).unwrap(), first);
    }
    // Independent encoders agree
    assert_eq!(
        KeyEncoder::new("app", 7, 1024).make_key(&"session".into()).unwrap(),
        first
    );
}

#[test]
fn test_distinct_version_key_pairs_never_collide() {
    let keys = ["a", "a:1", "1:a", "b", ":", "1", "10", "0:a"];
    let mut seen = HashSet::new();
    for version in [0, 1, 10, -1, 11] {
        for key in keys {
            let wire = encode_key("pfx", version, key, 1024).unwrap();
            assert!(seen.insert(wire.clone()), "collision on {}", wire);
        }
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_empty_key_rejected() {
    let result = encode_key("app", 1, "", 1024);
    assert!(matches!(result, Err(CacheError::InvalidKey(_))));
}

#[test]
fn test_length_limit_applies_to_wire_key() {
    let encoder = setup_encoder();
    // "app:1:" is 6 bytes, leaving 58 for the logical key
    let fits = "k".repeat(58);
    let too_long = "k".repeat(59);

    assert_eq!(encoder.make_key(&CacheKey::new(fits.as_str())).unwrap().len(), 64);
    assert!(matches!(
        encoder.make_key(&CacheKey::new(too_long.as_str())),
        Err(CacheError::InvalidKey(_))
    ));
}

#[test]
fn test_length_limit_counts_bytes_not_chars() {
    let encoder = KeyEncoder::new("", 1, 8);
    // ":1:" + 3 two-byte chars = 9 bytes
    assert!(encoder.make_key(&CacheKey::new("ééé")).is_err());
}

// =============================================================================
// Override Tests
// =============================================================================

#[test]
fn test_version_override() {
    let encoder = setup_encoder();
    let key = CacheKey::new("k").with_version(5);
    assert_eq!(encoder.make_key(&key).unwrap(), "app:5:k");
    assert_eq!(encoder.make_versioned("k", Some(9)).unwrap(), "app:9:k");
    assert_eq!(encoder.make_versioned("k", None).unwrap(), "app:1:k");
}

#[test]
fn test_prefix_override() {
    let encoder = setup_encoder();
    let key = CacheKey::new("k").with_prefix("other");
    assert_eq!(encoder.make_key(&key).unwrap(), "other:1:k");
}

#[test]
fn test_key_conversions() {
    let owned = String::from("owned");
    assert_eq!(CacheKey::from(&owned).key, "owned");
    assert_eq!(CacheKey::from(owned.clone()).key, "owned");
    let versioned: CacheKey = ("k", 4).into();
    assert_eq!(versioned.version, Some(4));
}
