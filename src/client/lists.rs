//! List operations
//!
//! Indices follow the backend convention: inclusive ranges, negative indices
//! count from the tail (`-1` is the last element).

use crate::backend::Backend;
use crate::codec::Value;
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::protocol::{Command, InsertPosition, Reply};
use crate::router::Access;

use super::{key_bytes, CacheClient};

/// Backend messages that mean `lset` addressed no element
const LSET_OUT_OF_RANGE: [&str; 2] = ["index out of range", "no such key"];

#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

impl<B: Backend> CacheClient<B> {
    fn push(&self, key: CacheKey<'_>, end: End, values: Vec<Vec<u8>>) -> Result<u64> {
        let wire = self.wire_key(&key)?;
        if values.is_empty() {
            return self.run(
                &wire,
                Access::Read,
                &Command::LLen { key: key_bytes(&wire) },
                Reply::into_count,
            );
        }
        let key = key_bytes(&wire);
        let command = match end {
            End::Head => Command::LPush { key, values },
            End::Tail => Command::RPush { key, values },
        };
        self.run(&wire, Access::Write, &command, Reply::into_count)
    }

    /// Prepend `values` one by one (the last ends up first). Returns the new length.
    pub fn lpush<'k, I>(&self, key: impl Into<CacheKey<'k>>, values: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let key = key.into();
        let values = self.encode_members(values)?;
        self.guarded("lpush", || 0, || self.push(key, End::Head, values))
    }

    /// Append `values` in order. Returns the new length.
    pub fn rpush<'k, I>(&self, key: impl Into<CacheKey<'k>>, values: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let key = key.into();
        let values = self.encode_members(values)?;
        self.guarded("rpush", || 0, || self.push(key, End::Tail, values))
    }

    fn pop(&self, key: &CacheKey<'_>, end: End, count: Option<usize>) -> Result<Option<Vec<Value>>> {
        let wire = self.wire_key(key)?;
        let key = key_bytes(&wire);
        let command = match end {
            End::Head => Command::LPop { key, count },
            End::Tail => Command::RPop { key, count },
        };
        let popped = self.run(&wire, Access::Write, &command, Reply::into_optional_array)?;
        match popped {
            Some(payloads) if !payloads.is_empty() => self.codec.decode_all(payloads).map(Some),
            _ => Ok(None),
        }
    }

    /// Remove and return the first element
    pub fn lpop<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<Option<Value>> {
        let key = key.into();
        self.guarded("lpop", || None, || {
            Ok(self.pop(&key, End::Head, None)?.and_then(|v| v.into_iter().next()))
        })
    }

    /// Remove and return up to `count` elements from the head, in list order
    pub fn lpop_count<'k>(&self, key: impl Into<CacheKey<'k>>, count: usize) -> Result<Option<Vec<Value>>> {
        let key = key.into();
        self.guarded("lpop", || None, || self.pop(&key, End::Head, Some(count)))
    }

    /// Remove and return the last element
    pub fn rpop<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<Option<Value>> {
        let key = key.into();
        self.guarded("rpop", || None, || {
            Ok(self.pop(&key, End::Tail, None)?.and_then(|v| v.into_iter().next()))
        })
    }

    /// Remove and return up to `count` elements from the tail, last element first
    pub fn rpop_count<'k>(&self, key: impl Into<CacheKey<'k>>, count: usize) -> Result<Option<Vec<Value>>> {
        let key = key.into();
        self.guarded("rpop", || None, || self.pop(&key, End::Tail, Some(count)))
    }

    pub fn llen<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<u64> {
        let key = key.into();
        self.guarded("llen", || 0, || {
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Read,
                &Command::LLen { key: key_bytes(&wire) },
                Reply::into_count,
            )
        })
    }

    /// Elements `start..=stop`
    pub fn lrange<'k>(&self, key: impl Into<CacheKey<'k>>, start: i64, stop: i64) -> Result<Vec<Value>> {
        let key = key.into();
        self.guarded("lrange", Vec::new, || {
            let wire = self.wire_key(&key)?;
            let payloads = self.run(
                &wire,
                Access::Read,
                &Command::LRange { key: key_bytes(&wire), start, stop },
                Reply::into_bulk_array,
            )?;
            self.codec.decode_all(payloads)
        })
    }

    pub fn lindex<'k>(&self, key: impl Into<CacheKey<'k>>, index: i64) -> Result<Option<Value>> {
        let key = key.into();
        self.guarded("lindex", || None, || {
            let wire = self.wire_key(&key)?;
            let payload = self.run(
                &wire,
                Access::Read,
                &Command::LIndex { key: key_bytes(&wire), index },
                Reply::into_optional_bulk,
            )?;
            self.decode_optional(payload)
        })
    }

    /// Overwrite the element at `index`
    ///
    /// Fails with `IndexOutOfRange` when the index is outside the list or
    /// the list does not exist.
    pub fn lset<'k>(&self, key: impl Into<CacheKey<'k>>, index: i64, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.guarded("lset", || (), || {
            let wire = self.wire_key(&key)?;
            let value = self.encode(&value)?;
            let result = self.run(
                &wire,
                Access::Write,
                &Command::LSet { key: key_bytes(&wire), index, value },
                |_| Ok(()),
            );
            match result {
                Err(CacheError::BackendCommand(message))
                    if LSET_OUT_OF_RANGE
                        .iter()
                        .any(|m| message.to_ascii_lowercase().contains(m)) =>
                {
                    Err(CacheError::IndexOutOfRange(format!(
                        "lset {} on {}: {}",
                        index, key.key, message
                    )))
                }
                other => other,
            }
        })
    }

    /// Remove occurrences of `value`
    ///
    /// `count > 0` removes the first `count` from the head, `count < 0` the
    /// first `|count|` from the tail, `0` removes all. Returns how many were
    /// removed.
    pub fn lrem<'k>(&self, key: impl Into<CacheKey<'k>>, count: i64, value: impl Into<Value>) -> Result<u64> {
        let key = key.into();
        let value = value.into();
        self.guarded("lrem", || 0, || {
            let wire = self.wire_key(&key)?;
            let value = self.encode(&value)?;
            self.run(
                &wire,
                Access::Write,
                &Command::LRem { key: key_bytes(&wire), count, value },
                Reply::into_count,
            )
        })
    }

    /// Keep only elements `start..=stop`
    pub fn ltrim<'k>(&self, key: impl Into<CacheKey<'k>>, start: i64, stop: i64) -> Result<()> {
        let key = key.into();
        self.guarded("ltrim", || (), || {
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Write,
                &Command::LTrim { key: key_bytes(&wire), start, stop },
                |_| Ok(()),
            )
        })
    }

    /// Insert `value` next to the first occurrence of `pivot`
    ///
    /// Returns the new length, `Some(0)` if the list does not exist, and
    /// `None` if `pivot` is not in the list.
    pub fn linsert<'k>(
        &self,
        key: impl Into<CacheKey<'k>>,
        position: InsertPosition,
        pivot: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Result<Option<u64>> {
        let key = key.into();
        let pivot = pivot.into();
        let value = value.into();
        self.guarded("linsert", || None, || {
            let wire = self.wire_key(&key)?;
            let command = Command::LInsert {
                key: key_bytes(&wire),
                position,
                pivot: self.encode(&pivot)?,
                value: self.encode(&value)?,
            };
            let length = self.run(&wire, Access::Write, &command, Reply::into_int)?;
            Ok(u64::try_from(length).ok())
        })
    }
}
