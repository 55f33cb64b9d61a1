//! Batch operations
//!
//! Keys are grouped by owning shard and each shard receives a single
//! MGET/MSET/DEL. Results are reassembled in the caller's order. Shards are
//! not failed over: a failed shard is reported in
//! [`CacheError::PartialFailure`] together with what the healthy shards
//! returned. Already-applied writes are not rolled back.

use std::collections::{BTreeMap, HashSet};

use crate::backend::Backend;
use crate::codec::Value;
use crate::error::{BackendError, CacheError, PartialResult, Result, ShardFailure};
use crate::key::CacheKey;
use crate::protocol::{Command, Reply};
use crate::router::Access;

use super::{key_bytes, CacheClient, Expiry, WireExpiry};

/// Logical keys with their wire keys, duplicates removed, in request order
#[derive(Default)]
struct KeyBatch {
    logical: Vec<String>,
    wire: Vec<String>,
}

impl KeyBatch {
    /// Returns false if `wire` was already present
    fn push(&mut self, seen: &mut HashSet<String>, logical: String, wire: String) -> bool {
        if !seen.insert(wire.clone()) {
            return false;
        }
        self.logical.push(logical);
        self.wire.push(wire);
        true
    }

    fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }
}

/// MGET answers one slot per requested key; any other length is malformed
fn one_per_key<T>(items: Vec<T>, expected: usize) -> std::result::Result<Vec<T>, BackendError> {
    if items.len() != expected {
        return Err(BackendError::Protocol(format!(
            "MGET returned {} value(s) for {} key(s)",
            items.len(),
            expected
        )));
    }
    Ok(items)
}

impl<B: Backend> CacheClient<B> {
    fn key_batch<'k, I, K>(&self, keys: I) -> Result<KeyBatch>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey<'k>>,
    {
        let mut seen = HashSet::new();
        let mut batch = KeyBatch::default();
        for key in keys {
            let key = key.into();
            let wire = self.wire_key(&key)?;
            batch.push(&mut seen, key.key.into_owned(), wire);
        }
        Ok(batch)
    }

    /// Positions of `wire_keys` grouped by owning shard
    fn partition(&self, wire_keys: &[String], access: Access) -> BTreeMap<usize, Vec<usize>> {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (position, wire) in wire_keys.iter().enumerate() {
            groups
                .entry(self.router.select(wire, access))
                .or_default()
                .push(position);
        }
        groups
    }

    /// Record a shard failure, or propagate it if it is not connectivity-class
    fn shard_failed(
        &self,
        operation: &str,
        index: usize,
        error: BackendError,
        failures: &mut Vec<ShardFailure>,
    ) -> Result<()> {
        self.discard_if_malformed(index, &error);
        let address = self.pool.address(index);
        if !error.is_connectivity() {
            return Err(error.into_cache_error(&address));
        }
        tracing::warn!("{} failed on {}: {}", operation, address, error);
        failures.push(ShardFailure {
            endpoint: address,
            reason: error.to_string(),
        });
        Ok(())
    }

    /// Turn per-shard failures into the batch result
    ///
    /// A lone shard failing is reported like a single-key failure. Ignore
    /// mode returns whatever the healthy shards produced.
    fn settle<T>(
        &self,
        operation: &str,
        shards: usize,
        failures: Vec<ShardFailure>,
        value: T,
        partial: impl FnOnce(T) -> PartialResult,
    ) -> Result<T> {
        if failures.is_empty() {
            return Ok(value);
        }

        if self.config.ignore_exceptions {
            if self.config.log_ignored_exceptions {
                for failure in &failures {
                    tracing::warn!(
                        "Ignoring error in {} on {}: {}",
                        operation,
                        failure.endpoint,
                        failure.reason
                    );
                }
            }
            return Ok(value);
        }

        if shards == 1 {
            if let [failure] = failures.as_slice() {
                return Err(CacheError::ConnectionInterrupted {
                    endpoint: failure.endpoint.clone(),
                    reason: failure.reason.clone(),
                });
            }
        }

        Err(CacheError::PartialFailure {
            failures,
            partial: partial(value),
        })
    }

    /// Values for every key present, in request order. Missing keys are
    /// omitted, as are repeated keys after their first occurrence.
    ///
    /// Each result carries the logical key only. Keys that differ solely in
    /// their version or prefix override come back under the same name; tell
    /// them apart by position, since request order is kept.
    pub fn get_many<'k, I, K>(&self, keys: I) -> Result<Vec<(String, Value)>>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey<'k>>,
    {
        let batch = self.key_batch(keys)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let groups = self.partition(&batch.wire, Access::Read);
        let mut found: Vec<Option<Value>> = vec![None; batch.wire.len()];
        let mut failures = Vec::new();

        for (&index, positions) in &groups {
            let command = Command::MGet {
                keys: positions.iter().map(|&p| key_bytes(&batch.wire[p])).collect(),
            };
            match self
                .call_shard(index, &command)
                .and_then(Reply::into_optional_bulk_array)
                .and_then(|payloads| one_per_key(payloads, positions.len()))
            {
                Ok(payloads) => {
                    for (&position, payload) in positions.iter().zip(payloads) {
                        found[position] = self.decode_optional(payload)?;
                    }
                }
                Err(e) => self.shard_failed("get_many", index, e, &mut failures)?,
            }
        }

        let values: Vec<(String, Value)> = batch
            .logical
            .into_iter()
            .zip(found)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();

        self.settle("get_many", groups.len(), failures, values, PartialResult::Values)
    }

    /// Store every entry. Repeated keys keep their first value.
    pub fn set_many<'k, I, K, V>(&self, entries: I, expiry: Expiry) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<CacheKey<'k>>,
        V: Into<Value>,
    {
        let mut seen = HashSet::new();
        let mut batch = KeyBatch::default();
        let mut payloads = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            let wire = self.wire_key(&key)?;
            let payload = self.encode(&value.into())?;
            if batch.push(&mut seen, key.key.into_owned(), wire) {
                payloads.push(payload);
            }
        }
        if batch.is_empty() {
            return Ok(());
        }

        let expiry_ms = match self.resolve_expiry(expiry) {
            WireExpiry::Keep => None,
            WireExpiry::Millis(ms) => Some(ms),
            WireExpiry::Immediately => {
                return self.delete_batch("set_many", batch).map(|_| ());
            }
        };

        let groups = self.partition(&batch.wire, Access::Write);
        let mut written = vec![false; batch.wire.len()];
        let mut failures = Vec::new();

        for (&index, positions) in &groups {
            let command = Command::MSet {
                entries: positions
                    .iter()
                    .map(|&p| (key_bytes(&batch.wire[p]), payloads[p].clone()))
                    .collect(),
                expiry_ms,
            };
            match self.call_shard(index, &command) {
                Ok(_) => positions.iter().for_each(|&p| written[p] = true),
                Err(e) => self.shard_failed("set_many", index, e, &mut failures)?,
            }
        }

        let written_keys: Vec<String> = batch
            .logical
            .into_iter()
            .zip(written)
            .filter_map(|(key, ok)| ok.then_some(key))
            .collect();

        self.settle("set_many", groups.len(), failures, written_keys, PartialResult::Written)
            .map(|_| ())
    }

    /// Remove every key. Returns how many existed.
    pub fn delete_many<'k, I, K>(&self, keys: I) -> Result<u64>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey<'k>>,
    {
        let batch = self.key_batch(keys)?;
        self.delete_batch("delete_many", batch)
    }

    fn delete_batch(&self, operation: &str, batch: KeyBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let groups = self.partition(&batch.wire, Access::Write);
        let mut deleted = 0u64;
        let mut failures = Vec::new();

        for (&index, positions) in &groups {
            let command = Command::Del {
                keys: positions.iter().map(|&p| key_bytes(&batch.wire[p])).collect(),
            };
            match self.call_shard(index, &command).and_then(Reply::into_count) {
                Ok(n) => deleted += n,
                Err(e) => self.shard_failed(operation, index, e, &mut failures)?,
            }
        }

        self.settle(operation, groups.len(), failures, deleted, PartialResult::Deleted)
    }
}
