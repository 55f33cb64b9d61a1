//! Tests for scalar operations on the Operation Dispatcher
//!
//! These tests verify:
//! - get/set/add/set_if_exists/delete semantics
//! - Expiry handling (default, never, explicit, zero)
//! - Counters, TTL inspection and persist/touch
//! - Key versioning isolates generations
//! - Error kinds for bad keys and wrong types

use std::thread;
use std::time::Duration;

use shardcache::{CacheClient, CacheError, CacheKey, ClientConfig, Expiry, KeyTtl, MemoryBackend, Value};

// =============================================================================
// Helper Functions
// =============================================================================

const ADDRESS: &str = "10.0.0.1:6379";

fn setup_client() -> (MemoryBackend, CacheClient<MemoryBackend>) {
    let config = ClientConfig::builder()
        .location(format!("redis://{}", ADDRESS))
        .key_prefix("app")
        .build();
    setup_client_with(config)
}

fn setup_client_with(config: ClientConfig) -> (MemoryBackend, CacheClient<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let client = CacheClient::new(backend.clone(), config).unwrap();
    (backend, client)
}

fn remaining(ttl: KeyTtl) -> Duration {
    match ttl {
        KeyTtl::Expires(d) => d,
        other => panic!("Expected an expiry, got {:?}", other),
    }
}

// =============================================================================
// Get / Set Tests
// =============================================================================

#[test]
fn test_get_miss_returns_none() {
    let (_backend, client) = setup_client();
    assert_eq!(client.get("missing").unwrap(), None);
    assert_eq!(client.get_or("missing", "fallback").unwrap(), Value::from("fallback"));
}

#[test]
fn test_set_then_get() {
    let (_backend, client) = setup_client();

    client.set("name", "widget", Expiry::Never).unwrap();
    client.set("count", 42i64, Expiry::Never).unwrap();
    client
        .set("tags", vec![Value::from("a"), Value::from("b")], Expiry::Never)
        .unwrap();

    assert_eq!(client.get("name").unwrap(), Some(Value::from("widget")));
    assert_eq!(client.get("count").unwrap(), Some(Value::Int(42)));
    assert_eq!(
        client.get("tags").unwrap(),
        Some(Value::List(vec![Value::from("a"), Value::from("b")]))
    );
}

#[test]
fn test_set_overwrites() {
    let (_backend, client) = setup_client();
    client.set("k", "one", Expiry::Never).unwrap();
    client.set("k", "two", Expiry::Never).unwrap();
    assert_eq!(client.get("k").unwrap(), Some(Value::from("two")));
}

#[test]
fn test_wire_key_carries_prefix_and_version() {
    let (backend, client) = setup_client();
    client.set("k", "v", Expiry::Never).unwrap();

    assert_eq!(client.make_key("k").unwrap(), "app:1:k");
    assert_eq!(backend.key_count(ADDRESS, 0), 1);
}

#[test]
fn test_add_only_when_absent() {
    let (_backend, client) = setup_client();

    assert!(client.add("k", "first", Expiry::Never).unwrap());
    assert!(!client.add("k", "second", Expiry::Never).unwrap());
    assert_eq!(client.get("k").unwrap(), Some(Value::from("first")));
}

#[test]
fn test_set_if_exists_only_when_present() {
    let (_backend, client) = setup_client();

    assert!(!client.set_if_exists("k", "v", Expiry::Never).unwrap());
    assert_eq!(client.get("k").unwrap(), None);

    client.set("k", "old", Expiry::Never).unwrap();
    assert!(client.set_if_exists("k", "new", Expiry::Never).unwrap());
    assert_eq!(client.get("k").unwrap(), Some(Value::from("new")));
}

#[test]
fn test_delete_and_has_key() {
    let (_backend, client) = setup_client();
    client.set("k", "v", Expiry::Never).unwrap();

    assert!(client.has_key("k").unwrap());
    assert!(client.delete("k").unwrap());
    assert!(!client.has_key("k").unwrap());
    assert!(!client.delete("k").unwrap());
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_default_expiry_comes_from_config() {
    let config = ClientConfig::builder()
        .location(format!("redis://{}", ADDRESS))
        .default_timeout(Some(Duration::from_secs(60)))
        .build();
    let (_backend, client) = setup_client_with(config);

    client.set("k", "v", Expiry::Default).unwrap();
    let left = remaining(client.ttl("k").unwrap());
    assert!(left > Duration::from_secs(55) && left <= Duration::from_secs(60));
}

#[test]
fn test_default_expiry_none_means_persistent() {
    let config = ClientConfig::builder()
        .location(format!("redis://{}", ADDRESS))
        .default_timeout(None)
        .build();
    let (_backend, client) = setup_client_with(config);

    client.set("k", "v", Expiry::Default).unwrap();
    assert_eq!(client.ttl("k").unwrap(), KeyTtl::Persistent);
}

#[test]
fn test_explicit_expiry_elapses() {
    let (_backend, client) = setup_client();
    client
        .set("k", "v", Expiry::After(Duration::from_millis(30)))
        .unwrap();
    assert!(client.has_key("k").unwrap());

    thread::sleep(Duration::from_millis(60));
    assert_eq!(client.get("k").unwrap(), None);
    assert_eq!(client.ttl("k").unwrap(), KeyTtl::Missing);
}

#[test]
fn test_zero_expiry_removes_key() {
    let (_backend, client) = setup_client();
    client.set("k", "v", Expiry::Never).unwrap();

    client.set("k", "gone", Expiry::After(Duration::ZERO)).unwrap();
    assert_eq!(client.get("k").unwrap(), None);

    // add with zero expiry stores nothing
    assert!(!client.add("fresh", "v", Duration::ZERO.into()).unwrap());
    assert!(!client.has_key("fresh").unwrap());
}

#[test]
fn test_ttl_persist_and_expire() {
    let (_backend, client) = setup_client();
    assert_eq!(client.ttl("k").unwrap(), KeyTtl::Missing);

    client.set("k", "v", Expiry::After(Duration::from_secs(100))).unwrap();
    assert!(remaining(client.ttl("k").unwrap()) <= Duration::from_secs(100));

    assert!(client.persist("k").unwrap());
    assert_eq!(client.ttl("k").unwrap(), KeyTtl::Persistent);
    assert!(!client.persist("k").unwrap());

    assert!(client.expire("k", Duration::from_secs(10)).unwrap());
    assert!(remaining(client.ttl("k").unwrap()) <= Duration::from_secs(10));
    assert!(!client.expire("missing", Duration::from_secs(10)).unwrap());
}

#[test]
fn test_touch() {
    let (_backend, client) = setup_client();
    assert!(!client.touch("k", Expiry::Never).unwrap());

    client.set("k", "v", Expiry::After(Duration::from_secs(5))).unwrap();
    assert!(client.touch("k", Expiry::After(Duration::from_secs(500))).unwrap());
    assert!(remaining(client.ttl("k").unwrap()) > Duration::from_secs(400));

    assert!(client.touch("k", Expiry::Never).unwrap());
    assert_eq!(client.ttl("k").unwrap(), KeyTtl::Persistent);
}

// =============================================================================
// Counter Tests
// =============================================================================

#[test]
fn test_incr_and_decr() {
    let (_backend, client) = setup_client();

    assert_eq!(client.incr("hits", 1).unwrap(), 1);
    assert_eq!(client.incr("hits", 10).unwrap(), 11);
    assert_eq!(client.decr("hits", 4).unwrap(), 7);
    assert_eq!(client.get("hits").unwrap(), Some(Value::Int(7)));
}

#[test]
fn test_incr_on_value_written_by_set() {
    let (_backend, client) = setup_client();
    client.set("n", 40i64, Expiry::Never).unwrap();
    assert_eq!(client.incr("n", 2).unwrap(), 42);
}

#[test]
fn test_incr_on_non_integer_is_backend_error() {
    let (_backend, client) = setup_client();
    client.set("s", "text", Expiry::Never).unwrap();
    assert!(matches!(client.incr("s", 1), Err(CacheError::BackendCommand(_))));
}

#[test]
fn test_decr_min_overflows() {
    let (_backend, client) = setup_client();
    assert!(matches!(
        client.decr("n", i64::MIN),
        Err(CacheError::BackendCommand(_))
    ));
}

// =============================================================================
// Versioning Tests
// =============================================================================

#[test]
fn test_versions_are_isolated() {
    let (_backend, client) = setup_client();

    client.set(CacheKey::new("k").with_version(1), "v1", Expiry::Never).unwrap();
    client.set(("k", 2), "v2", Expiry::Never).unwrap();

    assert_eq!(client.get(("k", 1)).unwrap(), Some(Value::from("v1")));
    assert_eq!(client.get(("k", 2)).unwrap(), Some(Value::from("v2")));
    assert_eq!(client.get(("k", 3)).unwrap(), None);
    // Default version is 1
    assert_eq!(client.get("k").unwrap(), Some(Value::from("v1")));
}

#[test]
fn test_prefixes_are_isolated() {
    let (_backend, client) = setup_client();
    client.set(CacheKey::new("k").with_prefix("other"), "x", Expiry::Never).unwrap();
    assert_eq!(client.get("k").unwrap(), None);
    assert_eq!(
        client.get(CacheKey::new("k").with_prefix("other")).unwrap(),
        Some(Value::from("x"))
    );
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_invalid_key_rejected_before_io() {
    let (backend, client) = setup_client();

    assert!(matches!(client.get(""), Err(CacheError::InvalidKey(_))));
    let long = "k".repeat(2000);
    assert!(matches!(
        client.set(long.as_str(), "v", Expiry::Never),
        Err(CacheError::InvalidKey(_))
    ));
    assert_eq!(backend.round_trips(ADDRESS), 0);
}

#[test]
fn test_invalid_key_not_swallowed_in_ignore_mode() {
    let config = ClientConfig::builder()
        .location(format!("redis://{}", ADDRESS))
        .ignore_exceptions(true)
        .build();
    let (_backend, client) = setup_client_with(config);

    assert!(matches!(client.get(""), Err(CacheError::InvalidKey(_))));
}

#[test]
fn test_wrong_type_is_backend_command_error() {
    let (_backend, client) = setup_client();
    client.rpush("list", ["a"]).unwrap();
    assert!(matches!(client.get("list"), Err(CacheError::BackendCommand(_))));
}

// =============================================================================
// Whole Cache Tests
// =============================================================================

#[test]
fn test_clear_flushes_every_endpoint() {
    let config = ClientConfig::builder()
        .locations(["redis://10.0.0.1:6379", "redis://10.0.0.2:6379"])
        .build();
    let (backend, client) = setup_client_with(config);

    for i in 0..20 {
        client.set(format!("k{}", i), i, Expiry::Never).unwrap();
    }
    client.clear().unwrap();

    assert_eq!(backend.key_count("10.0.0.1:6379", 0), 0);
    assert_eq!(backend.key_count("10.0.0.2:6379", 0), 0);
}

#[test]
fn test_close_is_idempotent_and_client_reconnects() {
    let (backend, client) = setup_client();
    client.set("k", "v", Expiry::Never).unwrap();

    client.close();
    client.close();

    assert_eq!(client.get("k").unwrap(), Some(Value::from("v")));
    assert_eq!(backend.connections_opened(ADDRESS), 2);
}
