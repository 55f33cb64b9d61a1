//! Tests for failover and the failure policy
//!
//! These tests verify:
//! - Single endpoint: a connection failure surfaces as ConnectionInterrupted
//! - Several endpoints: ring-order failover, then NoEndpointsAvailable
//! - Command errors are never retried
//! - retry_on_timeout retries the same endpoint once
//! - Ignore mode returns each operation's default

use std::time::Duration;

use shardcache::{CacheClient, CacheError, ClientConfig, Expiry, KeyTtl, MemoryBackend, Value};

// =============================================================================
// Helper Functions
// =============================================================================

const ADDRESSES: [&str; 3] = ["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"];

fn config_for(count: usize) -> shardcache::config::ClientConfigBuilder {
    ClientConfig::builder().locations(
        ADDRESSES[..count]
            .iter()
            .map(|a| format!("redis://{}", a)),
    )
}

fn setup_client(count: usize) -> (MemoryBackend, CacheClient<MemoryBackend>) {
    setup_client_with(config_for(count).build())
}

fn setup_client_with(config: ClientConfig) -> (MemoryBackend, CacheClient<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let client = CacheClient::new(backend.clone(), config).unwrap();
    (backend, client)
}

/// A key whose primary endpoint is `index`
fn key_on_shard(client: &CacheClient<MemoryBackend>, index: usize) -> String {
    (0..)
        .map(|i| format!("key-{}", i))
        .find(|k| client.shard_for(k.as_str()).unwrap() == index)
        .unwrap()
}

// =============================================================================
// Single Endpoint Tests
// =============================================================================

#[test]
fn test_single_endpoint_down_is_connection_interrupted() {
    let (backend, client) = setup_client(1);
    backend.fail_endpoint(ADDRESSES[0]);

    match client.get("k") {
        Err(CacheError::ConnectionInterrupted { endpoint, .. }) => {
            assert_eq!(endpoint, ADDRESSES[0]);
        }
        other => panic!("Expected ConnectionInterrupted, got {:?}", other),
    }
    assert!(matches!(
        client.set("k", "v", Expiry::Never),
        Err(CacheError::ConnectionInterrupted { .. })
    ));
}

#[test]
fn test_single_endpoint_recovers() {
    let (backend, client) = setup_client(1);
    backend.fail_endpoint(ADDRESSES[0]);
    assert!(client.get("k").is_err());

    backend.restore_endpoint(ADDRESSES[0]);
    client.set("k", "v", Expiry::Never).unwrap();
    assert_eq!(client.get("k").unwrap(), Some(Value::from("v")));
}

// =============================================================================
// Failover Tests
// =============================================================================

#[test]
fn test_failover_to_next_endpoint_in_ring_order() {
    let (backend, client) = setup_client(3);
    let key = key_on_shard(&client, 1);

    backend.fail_endpoint(ADDRESSES[1]);
    client.set(key.as_str(), "v", Expiry::Never).unwrap();

    // Landed on the next endpoint in the ring
    assert_eq!(backend.key_count(ADDRESSES[2], 0), 1);
    assert_eq!(backend.key_count(ADDRESSES[0], 0), 0);
    assert_eq!(client.get(key.as_str()).unwrap(), Some(Value::from("v")));
}

#[test]
fn test_failover_wraps_around_the_ring() {
    let (backend, client) = setup_client(3);
    let key = key_on_shard(&client, 2);

    backend.fail_endpoint(ADDRESSES[2]);
    client.set(key.as_str(), "v", Expiry::Never).unwrap();
    assert_eq!(backend.key_count(ADDRESSES[0], 0), 1);
}

#[test]
fn test_all_endpoints_down_is_no_endpoints_available() {
    let (backend, client) = setup_client(2);
    for address in &ADDRESSES[..2] {
        backend.fail_endpoint(address);
    }

    assert!(matches!(client.get("k"), Err(CacheError::NoEndpointsAvailable(_))));
    assert!(matches!(
        client.incr("counter", 1),
        Err(CacheError::NoEndpointsAvailable(_))
    ));
}

#[test]
fn test_command_error_is_not_retried() {
    let (backend, client) = setup_client(2);
    let key = key_on_shard(&client, 0);
    client.set(key.as_str(), "text", Expiry::Never).unwrap();

    let before: u64 = ADDRESSES[..2].iter().map(|a| backend.round_trips(a)).sum();
    assert!(matches!(
        client.incr(key.as_str(), 1),
        Err(CacheError::BackendCommand(_))
    ));
    let after: u64 = ADDRESSES[..2].iter().map(|a| backend.round_trips(a)).sum();
    assert_eq!(after - before, 1);
}

// =============================================================================
// Timeout Tests
// =============================================================================

#[test]
fn test_timeout_without_retry_fails_on_single_endpoint() {
    let (backend, client) = setup_client(1);
    client.set("k", "v", Expiry::Never).unwrap();

    backend.time_out_next(ADDRESSES[0], 1);
    assert!(matches!(
        client.get("k"),
        Err(CacheError::ConnectionInterrupted { .. })
    ));
    // The next call reconnects
    assert_eq!(client.get("k").unwrap(), Some(Value::from("v")));
}

#[test]
fn test_retry_on_timeout_retries_same_endpoint_once() {
    let config = config_for(1).retry_on_timeout(true).build();
    let (backend, client) = setup_client_with(config);
    client.set("k", "v", Expiry::Never).unwrap();

    backend.time_out_next(ADDRESSES[0], 1);
    assert_eq!(client.get("k").unwrap(), Some(Value::from("v")));
}

#[test]
fn test_retry_on_timeout_gives_up_after_one_retry() {
    let config = config_for(1).retry_on_timeout(true).build();
    let (backend, client) = setup_client_with(config);

    backend.time_out_next(ADDRESSES[0], 2);
    assert!(matches!(
        client.get("k"),
        Err(CacheError::ConnectionInterrupted { .. })
    ));
}

// =============================================================================
// Ignore Mode Tests
// =============================================================================

#[test]
fn test_ignore_mode_returns_defaults() {
    let config = config_for(1)
        .ignore_exceptions(true)
        .log_ignored_exceptions(true)
        .build();
    let (backend, client) = setup_client_with(config);
    backend.fail_endpoint(ADDRESSES[0]);

    assert_eq!(client.get("k").unwrap(), None);
    client.set("k", "v", Expiry::Never).unwrap();
    assert!(!client.add("k", "v", Expiry::Never).unwrap());
    assert!(!client.delete("k").unwrap());
    assert!(!client.has_key("k").unwrap());
    assert_eq!(client.incr("n", 1).unwrap(), 0);
    assert_eq!(client.ttl("k").unwrap(), KeyTtl::Missing);
    assert!(!client.expire("k", Duration::from_secs(1)).unwrap());
    assert_eq!(client.llen("l").unwrap(), 0);
    assert!(client.lrange("l", 0, -1).unwrap().is_empty());
    assert_eq!(client.hget("h", "f").unwrap(), None);
    assert!(client.smembers("s").unwrap().is_empty());
    assert_eq!(client.zscore("z", "a").unwrap(), None);
    client.clear().unwrap();
}

#[test]
fn test_ignore_mode_swallows_exhausted_ring() {
    let config = config_for(2).ignore_exceptions(true).build();
    let (backend, client) = setup_client_with(config);
    for address in &ADDRESSES[..2] {
        backend.fail_endpoint(address);
    }

    assert_eq!(client.get("k").unwrap(), None);
}

#[test]
fn test_ignore_mode_keeps_command_errors() {
    let config = config_for(1).ignore_exceptions(true).build();
    let (_backend, client) = setup_client_with(config);
    client.set("k", "text", Expiry::Never).unwrap();

    assert!(matches!(client.incr("k", 1), Err(CacheError::BackendCommand(_))));
}
