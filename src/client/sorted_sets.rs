//! Sorted set operations

use crate::backend::Backend;
use crate::codec::Value;
use crate::error::{BackendError, Result};
use crate::key::CacheKey;
use crate::protocol::{parse_float, Command, Reply};
use crate::router::Access;

use super::{key_bytes, CacheClient};

impl<B: Backend> CacheClient<B> {
    /// Add or rescore `(score, member)` pairs. Returns how many members are new.
    pub fn zadd<'k, I, V>(&self, key: impl Into<CacheKey<'k>>, members: I) -> Result<u64>
    where
        I: IntoIterator<Item = (f64, V)>,
        V: Into<Value>,
    {
        let key = key.into();
        let members = members
            .into_iter()
            .map(|(score, member)| Ok((score, self.encode(&member.into())?)))
            .collect::<Result<Vec<_>>>()?;
        self.guarded("zadd", || 0, || {
            if members.is_empty() {
                return Ok(0);
            }
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Write,
                &Command::ZAdd { key: key_bytes(&wire), members },
                Reply::into_count,
            )
        })
    }

    pub fn zrem<'k, I>(&self, key: impl Into<CacheKey<'k>>, members: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let key = key.into();
        let members = self.encode_members(members)?;
        self.guarded("zrem", || 0, || {
            if members.is_empty() {
                return Ok(0);
            }
            let wire = self.wire_key(&key)?;
            self.run(
                &wire,
                Access::Write,
                &Command::ZRem { key: key_bytes(&wire), members },
                Reply::into_count,
            )
        })
    }

    pub fn zscore<'k>(&self, key: impl Into<CacheKey<'k>>, member: impl Into<Value>) -> Result<Option<f64>> {
        let key = key.into();
        let member = member.into();
        self.guarded("zscore", || None, || {
            let wire = self.wire_key(&key)?;
            let member = self.encode(&member)?;
            self.run(
                &wire,
                Access::Read,
                &Command::ZScore { key: key_bytes(&wire), member },
                Reply::into_optional_float,
            )
        })
    }

    /// Members ranked `start..=stop` by ascending score
    pub fn zrange<'k>(&self, key: impl Into<CacheKey<'k>>, start: i64, stop: i64) -> Result<Vec<Value>> {
        let key = key.into();
        self.guarded("zrange", Vec::new, || {
            let wire = self.wire_key(&key)?;
            let payloads = self.run(
                &wire,
                Access::Read,
                &Command::ZRange { key: key_bytes(&wire), start, stop, with_scores: false },
                Reply::into_bulk_array,
            )?;
            self.codec.decode_all(payloads)
        })
    }

    /// Like [`CacheClient::zrange`], paired with each member's score
    pub fn zrange_with_scores<'k>(
        &self,
        key: impl Into<CacheKey<'k>>,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Value, f64)>> {
        let key = key.into();
        self.guarded("zrange_with_scores", Vec::new, || {
            let wire = self.wire_key(&key)?;
            let pairs = self.run(
                &wire,
                Access::Read,
                &Command::ZRange { key: key_bytes(&wire), start, stop, with_scores: true },
                |reply| {
                    let flat = reply.into_bulk_array()?;
                    if flat.len() % 2 != 0 {
                        return Err(BackendError::Protocol(
                            "ZRANGE WITHSCORES reply has an odd number of elements".to_string(),
                        ));
                    }
                    let mut pairs = Vec::with_capacity(flat.len() / 2);
                    let mut items = flat.into_iter();
                    while let (Some(member), Some(score)) = (items.next(), items.next()) {
                        pairs.push((member, parse_float(&score)?));
                    }
                    Ok(pairs)
                },
            )?;
            pairs
                .into_iter()
                .map(|(member, score)| Ok((self.codec.decode(&member)?, score)))
                .collect()
        })
    }

    pub fn zcard<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<u64> {
        let key = key.into();
        self.guarded("zcard", || 0, || {
            let wire = self.wire_key(&key)?;
            self.run(&wire, Access::Read, &Command::ZCard { key: key_bytes(&wire) }, Reply::into_count)
        })
    }

    /// Add `delta` to the score of `member` (created at 0). Returns the new score.
    pub fn zincrby<'k>(&self, key: impl Into<CacheKey<'k>>, delta: f64, member: impl Into<Value>) -> Result<f64> {
        let key = key.into();
        let member = member.into();
        self.guarded("zincrby", || 0.0, || {
            let wire = self.wire_key(&key)?;
            let member = self.encode(&member)?;
            self.run(
                &wire,
                Access::Write,
                &Command::ZIncrBy { key: key_bytes(&wire), delta, member },
                |reply| {
                    reply.into_optional_float()?.ok_or_else(|| {
                        BackendError::Protocol("ZINCRBY returned no score".to_string())
                    })
                },
            )
        })
    }
}
