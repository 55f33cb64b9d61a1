//! Tests for list operations
//!
//! These tests verify push/pop ordering, ranges, removal, trimming,
//! insertion and the error kinds list operations report.

use shardcache::protocol::InsertPosition;
use shardcache::{CacheClient, CacheError, ClientConfig, Expiry, MemoryBackend, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_client() -> CacheClient<MemoryBackend> {
    let config = ClientConfig::builder()
        .location("redis://10.0.0.1:6379")
        .build();
    CacheClient::new(MemoryBackend::new(), config).unwrap()
}

fn strs(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

fn setup_list(client: &CacheClient<MemoryBackend>, key: &str, values: &[&str]) {
    client.rpush(key, values.iter().copied()).unwrap();
}

// =============================================================================
// Push / Pop Tests
// =============================================================================

#[test]
fn test_rpush_then_lrange() {
    let client = setup_client();
    assert_eq!(client.rpush("l", ["a", "b", "c"]).unwrap(), 3);
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["a", "b", "c"]));
    assert_eq!(client.llen("l").unwrap(), 3);
}

#[test]
fn test_lpush_prepends_in_turn() {
    let client = setup_client();
    client.lpush("l", ["a", "b"]).unwrap();
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["b", "a"]));
}

#[test]
fn test_push_mixed_values() {
    let client = setup_client();
    client
        .rpush("l", [Value::Int(1), Value::from("two"), Value::Bool(true)])
        .unwrap();
    assert_eq!(
        client.lrange("l", 0, -1).unwrap(),
        vec![Value::Int(1), Value::from("two"), Value::Bool(true)]
    );
}

#[test]
fn test_empty_push_reports_length() {
    let client = setup_client();
    setup_list(&client, "l", &["a"]);
    assert_eq!(client.rpush("l", Vec::<Value>::new()).unwrap(), 1);
    assert_eq!(client.lpush("missing", Vec::<Value>::new()).unwrap(), 0);
}

#[test]
fn test_pop_single() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "c"]);

    assert_eq!(client.lpop("l").unwrap(), Some(Value::from("a")));
    assert_eq!(client.rpop("l").unwrap(), Some(Value::from("c")));
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["b"]));
    assert_eq!(client.lpop("missing").unwrap(), None);
}

#[test]
fn test_pop_with_count() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "c"]);

    assert_eq!(client.lpop_count("l", 2).unwrap(), Some(strs(&["a", "b"])));
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["c"]));

    assert_eq!(client.rpop_count("l", 5).unwrap(), Some(strs(&["c"])));
    assert_eq!(client.rpop_count("l", 5).unwrap(), None);
}

#[test]
fn test_drained_list_disappears() {
    let client = setup_client();
    setup_list(&client, "l", &["a"]);
    client.lpop("l").unwrap();
    assert!(!client.has_key("l").unwrap());
}

// =============================================================================
// Index / Range Tests
// =============================================================================

#[test]
fn test_lrange_bounds() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "c", "d"]);

    assert_eq!(client.lrange("l", 1, 2).unwrap(), strs(&["b", "c"]));
    assert_eq!(client.lrange("l", -2, -1).unwrap(), strs(&["c", "d"]));
    assert_eq!(client.lrange("l", 2, 100).unwrap(), strs(&["c", "d"]));
    assert!(client.lrange("l", 3, 1).unwrap().is_empty());
    assert!(client.lrange("missing", 0, -1).unwrap().is_empty());
}

#[test]
fn test_lindex() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "c"]);

    assert_eq!(client.lindex("l", 0).unwrap(), Some(Value::from("a")));
    assert_eq!(client.lindex("l", -1).unwrap(), Some(Value::from("c")));
    assert_eq!(client.lindex("l", 3).unwrap(), None);
}

#[test]
fn test_lset() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "c"]);

    client.lset("l", 1, "B").unwrap();
    client.lset("l", -1, "C").unwrap();
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["a", "B", "C"]));
}

#[test]
fn test_lset_out_of_range() {
    let client = setup_client();
    setup_list(&client, "l", &["a"]);

    assert!(matches!(client.lset("l", 5, "x"), Err(CacheError::IndexOutOfRange(_))));
    assert!(matches!(
        client.lset("missing", 0, "x"),
        Err(CacheError::IndexOutOfRange(_))
    ));
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_lrem_from_tail() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "a", "c", "a"]);

    assert_eq!(client.lrem("l", -2, "a").unwrap(), 2);
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["a", "b", "c"]));
}

#[test]
fn test_lrem_from_head_and_all() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "a", "c", "a"]);

    assert_eq!(client.lrem("l", 1, "a").unwrap(), 1);
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["b", "a", "c", "a"]));
    assert_eq!(client.lrem("l", 0, "a").unwrap(), 2);
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["b", "c"]));
    assert_eq!(client.lrem("missing", 0, "a").unwrap(), 0);
}

#[test]
fn test_ltrim() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "b", "c", "d", "e"]);

    client.ltrim("l", 1, -2).unwrap();
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["b", "c", "d"]));

    client.ltrim("l", 5, 10).unwrap();
    assert_eq!(client.llen("l").unwrap(), 0);
}

// =============================================================================
// Insert Tests
// =============================================================================

#[test]
fn test_linsert() {
    let client = setup_client();
    setup_list(&client, "l", &["a", "c"]);

    assert_eq!(
        client.linsert("l", InsertPosition::Before, "c", "b").unwrap(),
        Some(3)
    );
    assert_eq!(
        client.linsert("l", InsertPosition::After, "c", "d").unwrap(),
        Some(4)
    );
    assert_eq!(client.lrange("l", 0, -1).unwrap(), strs(&["a", "b", "c", "d"]));
}

#[test]
fn test_linsert_missing_pivot_and_key() {
    let client = setup_client();
    setup_list(&client, "l", &["a"]);

    assert_eq!(client.linsert("l", InsertPosition::After, "zz", "x").unwrap(), None);
    assert_eq!(
        client.linsert("missing", InsertPosition::After, "a", "x").unwrap(),
        Some(0)
    );
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_list_op_on_string_is_backend_error() {
    let client = setup_client();
    client.set("s", "text", Expiry::Never).unwrap();
    assert!(matches!(client.rpush("s", ["x"]), Err(CacheError::BackendCommand(_))));
    assert!(matches!(client.llen("s"), Err(CacheError::BackendCommand(_))));
}
