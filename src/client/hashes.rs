//! Hash operations
//!
//! Only the hash name goes through the key encoder. Field names are stored
//! as given; field values go through the codec.

use std::collections::BTreeMap;

use crate::backend::Backend;
use crate::codec::Value;
use crate::error::{BackendError, CacheError, Result};
use crate::key::CacheKey;
use crate::protocol::{Command, Reply};
use crate::router::Access;

use super::{key_bytes, CacheClient};

fn field_name(raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw)
        .map_err(|e| CacheError::Serialization(format!("hash field is not UTF-8: {}", e)))
}

impl<B: Backend> CacheClient<B> {
    /// Set `field` to `value`. Returns true if the field is new.
    pub fn hset<'k>(&self, key: impl Into<CacheKey<'k>>, field: &str, value: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        let value = value.into();
        self.guarded("hset", || false, || {
            let wire = self.wire_key(&key)?;
            let command = Command::HSet {
                key: key_bytes(&wire),
                field: field.as_bytes().to_vec(),
                value: self.encode(&value)?,
            };
            self.run(&wire, Access::Write, &command, Reply::into_bool)
        })
    }

    pub fn hget<'k>(&self, key: impl Into<CacheKey<'k>>, field: &str) -> Result<Option<Value>> {
        let key = key.into();
        self.guarded("hget", || None, || {
            let wire = self.wire_key(&key)?;
            let payload = self.run(
                &wire,
                Access::Read,
                &Command::HGet { key: key_bytes(&wire), field: field.as_bytes().to_vec() },
                Reply::into_optional_bulk,
            )?;
            self.decode_optional(payload)
        })
    }

    /// Remove `fields`. Returns how many existed.
    pub fn hdel<'k, 'f, I>(&self, key: impl Into<CacheKey<'k>>, fields: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'f str>,
    {
        let key = key.into();
        let fields: Vec<Vec<u8>> = fields.into_iter().map(|f| f.as_bytes().to_vec()).collect();
        self.guarded("hdel", || 0, || {
            if fields.is_empty() {
                return Ok(0);
            }
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Write,
                &Command::HDel { key: key_bytes(&wire), fields },
                Reply::into_count,
            )
        })
    }

    pub fn hlen<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<u64> {
        let key = key.into();
        self.guarded("hlen", || 0, || {
            let wire = self.wire_key(&key)?;
            self.run(&wire, Access::Read, &Command::HLen { key: key_bytes(&wire) }, Reply::into_count)
        })
    }

    pub fn hkeys<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<Vec<String>> {
        let key = key.into();
        self.guarded("hkeys", Vec::new, || {
            let wire = self.wire_key(&key)?;
            let raw = self.run(
                &wire,
                Access::Read,
                &Command::HKeys { key: key_bytes(&wire) },
                Reply::into_bulk_array,
            )?;
            raw.into_iter().map(field_name).collect()
        })
    }

    pub fn hexists<'k>(&self, key: impl Into<CacheKey<'k>>, field: &str) -> Result<bool> {
        let key = key.into();
        self.guarded("hexists", || false, || {
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Read,
                &Command::HExists { key: key_bytes(&wire), field: field.as_bytes().to_vec() },
                Reply::into_bool,
            )
        })
    }

    /// Every field and its decoded value
    pub fn hgetall<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<BTreeMap<String, Value>> {
        let key = key.into();
        self.guarded("hgetall", BTreeMap::new, || {
            let wire = self.wire_key(&key)?;
            let flat = self.run(
                &wire,
                Access::Read,
                &Command::HGetAll { key: key_bytes(&wire) },
                |reply| {
                    let flat = reply.into_bulk_array()?;
                    if flat.len() % 2 != 0 {
                        return Err(BackendError::Protocol(
                            "HGETALL reply has an odd number of elements".to_string(),
                        ));
                    }
                    Ok(flat)
                },
            )?;

            let mut map = BTreeMap::new();
            let mut items = flat.into_iter();
            while let (Some(field), Some(value)) = (items.next(), items.next()) {
                map.insert(field_name(field)?, self.codec.decode(&value)?);
            }
            Ok(map)
        })
    }
}
