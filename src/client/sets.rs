//! Set operations. Members go through the codec, so membership compares
//! encoded payloads.

use crate::backend::Backend;
use crate::codec::Value;
use crate::error::Result;
use crate::key::CacheKey;
use crate::protocol::{Command, Reply};
use crate::router::Access;

use super::{key_bytes, CacheClient};

impl<B: Backend> CacheClient<B> {
    /// Add `members`. Returns how many were not already present.
    pub fn sadd<'k, I>(&self, key: impl Into<CacheKey<'k>>, members: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let key = key.into();
        let members = self.encode_members(members)?;
        self.guarded("sadd", || 0, || {
            if members.is_empty() {
                return Ok(0);
            }
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Write,
                &Command::SAdd { key: key_bytes(&wire), members },
                Reply::into_count,
            )
        })
    }

    /// Remove `members`. Returns how many were present.
    pub fn srem<'k, I>(&self, key: impl Into<CacheKey<'k>>, members: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let key = key.into();
        let members = self.encode_members(members)?;
        self.guarded("srem", || 0, || {
            if members.is_empty() {
                return Ok(0);
            }
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Write,
                &Command::SRem { key: key_bytes(&wire), members },
                Reply::into_count,
            )
        })
    }

    pub fn smembers<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<Vec<Value>> {
        let key = key.into();
        self.guarded("smembers", Vec::new, || {
            let wire = self.wire_key(&key)?;
            let payloads = self.run(
                &wire,
                Access::Read,
                &Command::SMembers { key: key_bytes(&wire) },
                Reply::into_bulk_array,
            )?;
            self.codec.decode_all(payloads)
        })
    }

    pub fn sismember<'k>(&self, key: impl Into<CacheKey<'k>>, member: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        let member = member.into();
        self.guarded("sismember", || false, || {
            let wire = self.wire_key(&key)?;
            let member = self.encode(&member)?;
            self.run(
                &wire,
                Access::Read,
                &Command::SIsMember { key: key_bytes(&wire), member },
                Reply::into_bool,
            )
        })
    }

    pub fn scard<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<u64> {
        let key = key.into();
        self.guarded("scard", || 0, || {
            let wire = self.wire_key(&key)?;
            self.run(&wire, Access::Read, &Command::SCard { key: key_bytes(&wire) }, Reply::into_count)
        })
    }

    /// Remove and return an arbitrary member
    pub fn spop<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<Option<Value>> {
        let key = key.into();
        self.guarded("spop", || None, || {
            let wire = self.wire_key(&key)?;
            let payload = self.run(
                &wire,
                Access::Write,
                &Command::SPop { key: key_bytes(&wire) },
                Reply::into_optional_bulk,
            )?;
            self.decode_optional(payload)
        })
    }

    pub(super) fn encode_members<I>(&self, members: I) -> Result<Vec<Vec<u8>>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        members.into_iter().map(|m| self.encode(&m.into())).collect()
    }
}
