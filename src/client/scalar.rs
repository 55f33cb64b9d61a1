//! Scalar operations: get/set/delete, counters and expiry

use std::time::Duration;

use crate::backend::Backend;
use crate::codec::Value;
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::protocol::{Command, Reply, SetCondition};
use crate::router::Access;

use super::{key_bytes, CacheClient, Expiry, KeyTtl, WireExpiry};

impl<B: Backend> CacheClient<B> {
    /// Value stored at `key`, or `None` on a miss
    pub fn get<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<Option<Value>> {
        let key = key.into();
        self.guarded("get", || None, || {
            let wire = self.wire_key(&key)?;
            let payload = self.run(
                &wire,
                Access::Read,
                &Command::Get { key: key_bytes(&wire) },
                Reply::into_optional_bulk,
            )?;
            self.decode_optional(payload)
        })
    }

    /// Value stored at `key`, or `default` on a miss
    pub fn get_or<'k>(&self, key: impl Into<CacheKey<'k>>, default: impl Into<Value>) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Store `value` unconditionally
    pub fn set<'k>(
        &self,
        key: impl Into<CacheKey<'k>>,
        value: impl Into<Value>,
        expiry: Expiry,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.guarded("set", || (), || {
            self.conditional_set(&key, &value, expiry, SetCondition::Always)
                .map(|_| ())
        })
    }

    /// Store `value` only if `key` is absent. Returns whether it was stored.
    pub fn add<'k>(
        &self,
        key: impl Into<CacheKey<'k>>,
        value: impl Into<Value>,
        expiry: Expiry,
    ) -> Result<bool> {
        let key = key.into();
        let value = value.into();
        self.guarded("add", || false, || {
            self.conditional_set(&key, &value, expiry, SetCondition::IfAbsent)
        })
    }

    /// Store `value` only if `key` already exists. Returns whether it was stored.
    pub fn set_if_exists<'k>(
        &self,
        key: impl Into<CacheKey<'k>>,
        value: impl Into<Value>,
        expiry: Expiry,
    ) -> Result<bool> {
        let key = key.into();
        let value = value.into();
        self.guarded("set_if_exists", || false, || {
            self.conditional_set(&key, &value, expiry, SetCondition::IfExists)
        })
    }

    fn conditional_set(
        &self,
        key: &CacheKey<'_>,
        value: &Value,
        expiry: Expiry,
        condition: SetCondition,
    ) -> Result<bool> {
        let wire = self.wire_key(key)?;
        let payload = self.encode(value)?;

        let expiry_ms = match self.resolve_expiry(expiry) {
            WireExpiry::Keep => None,
            WireExpiry::Millis(ms) => Some(ms),
            WireExpiry::Immediately => {
                return match condition {
                    // nothing would survive the write
                    SetCondition::IfAbsent => Ok(false),
                    SetCondition::Always | SetCondition::IfExists => {
                        let deleted = self.delete_wire(&wire)?;
                        Ok(condition == SetCondition::Always || deleted)
                    }
                };
            }
        };

        self.run(
            &wire,
            Access::Write,
            &Command::Set {
                key: key_bytes(&wire),
                value: payload,
                expiry_ms,
                condition,
            },
            Reply::into_bool,
        )
    }

    /// Remove `key`. Returns whether it existed.
    pub fn delete<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<bool> {
        let key = key.into();
        self.guarded("delete", || false, || {
            let wire = self.wire_key(&key)?;
            self.delete_wire(&wire)
        })
    }

    fn delete_wire(&self, wire: &str) -> Result<bool> {
        self.run(
            wire,
            Access::Write,
            &Command::Del { keys: vec![key_bytes(wire)] },
            Reply::into_bool,
        )
    }

    pub fn has_key<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<bool> {
        let key = key.into();
        self.guarded("has_key", || false, || {
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Read,
                &Command::Exists { key: key_bytes(&wire) },
                Reply::into_bool,
            )
        })
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Add `delta` to the integer at `key` (a missing key counts as 0)
    pub fn incr<'k>(&self, key: impl Into<CacheKey<'k>>, delta: i64) -> Result<i64> {
        let key = key.into();
        self.guarded("incr", || 0, || {
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Write,
                &Command::IncrBy { key: key_bytes(&wire), delta },
                Reply::into_int,
            )
        })
    }

    pub fn decr<'k>(&self, key: impl Into<CacheKey<'k>>, delta: i64) -> Result<i64> {
        let negated = delta.checked_neg().ok_or_else(|| {
            CacheError::BackendCommand(format!("decrement by {} overflows", delta))
        })?;
        self.incr(key, negated)
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Set the remaining lifetime of `key`. Returns whether the key exists.
    pub fn expire<'k>(&self, key: impl Into<CacheKey<'k>>, ttl: Duration) -> Result<bool> {
        let key = key.into();
        self.guarded("expire", || false, || {
            let wire = self.wire_key(&key)?;
            self.pexpire_wire(&wire, super::millis(ttl))
        })
    }

    fn pexpire_wire(&self, wire: &str, ms: u64) -> Result<bool> {
        self.run(
            wire,
            Access::Write,
            &Command::PExpire { key: key_bytes(wire), ms },
            Reply::into_bool,
        )
    }

    pub fn ttl<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<KeyTtl> {
        let key = key.into();
        self.guarded("ttl", || KeyTtl::Missing, || {
            let wire = self.wire_key(&key)?;
            let ms = self.run(
                &wire,
                Access::Read,
                &Command::PTtl { key: key_bytes(&wire) },
                Reply::into_int,
            )?;
            Ok(match ms {
                -2 => KeyTtl::Missing,
                ms if ms < 0 => KeyTtl::Persistent,
                ms => KeyTtl::Expires(Duration::from_millis(ms as u64)),
            })
        })
    }

    /// Drop the expiry of `key`. Returns whether an expiry was removed.
    pub fn persist<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<bool> {
        let key = key.into();
        self.guarded("persist", || false, || {
            let wire = self.wire_key(&key)?;
            self.persist_wire(&wire)
        })
    }

    fn persist_wire(&self, wire: &str) -> Result<bool> {
        self.run(
            wire,
            Access::Write,
            &Command::Persist { key: key_bytes(wire) },
            Reply::into_bool,
        )
    }

    /// Reset the expiry of an existing key. Returns whether the key exists.
    pub fn touch<'k>(&self, key: impl Into<CacheKey<'k>>, expiry: Expiry) -> Result<bool> {
        let key = key.into();
        self.guarded("touch", || false, || {
            let wire = self.wire_key(&key)?;
            match self.resolve_expiry(expiry) {
                WireExpiry::Millis(ms) => self.pexpire_wire(&wire, ms),
                WireExpiry::Immediately => self.delete_wire(&wire),
                WireExpiry::Keep => {
                    let exists = self.run(
                        &wire,
                        Access::Read,
                        &Command::Exists { key: key_bytes(&wire) },
                        Reply::into_bool,
                    )?;
                    if exists {
                        self.persist_wire(&wire)?;
                    }
                    Ok(exists)
                }
            }
        })
    }

    // =========================================================================
    // Whole Cache
    // =========================================================================

    /// Flush the selected database on every endpoint
    pub fn clear(&self) -> Result<()> {
        self.guarded("clear", || (), || {
            let mut first_error = None;
            for index in 0..self.pool.len() {
                if let Err(e) = self.call_shard(index, &Command::FlushDb) {
                    let address = self.pool.address(index);
                    tracing::warn!("Failed to flush {}: {}", address, e);
                    first_error.get_or_insert(e.into_cache_error(&address));
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}
