//! Shard Router
//!
//! Maps a wire key onto one endpoint index of the configured sharding set.
//!
//! ## Selection
//! ```text
//! index = crc32(wire_key) % endpoint_count
//! ```
//!
//! CRC32 is fixed by definition, so the mapping is identical across processes,
//! platforms and restarts. Reads and writes of the same key always agree.
//! On failure the caller walks the ring (`index + 1`, `index + 2`, ...)
//! skipping endpoints already tried for the same operation.

use crate::error::{CacheError, Result};

/// Whether the operation reads or mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Endpoint indices already attempted for one logical operation
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    tried: Vec<usize>,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_tried(&mut self, index: usize) {
        if !self.tried.contains(&index) {
            self.tried.push(index);
        }
    }

    pub fn has_tried(&self, index: usize) -> bool {
        self.tried.contains(&index)
    }

    /// Indices in the order they were attempted
    pub fn tried(&self) -> &[usize] {
        &self.tried
    }
}

/// Deterministic key-to-shard mapping
#[derive(Debug, Clone)]
pub struct ShardRouter {
    shard_count: usize,
}

impl ShardRouter {
    pub fn new(shard_count: usize) -> Result<Self> {
        if shard_count == 0 {
            return Err(CacheError::Config(
                "at least one endpoint is required".to_string(),
            ));
        }
        Ok(Self { shard_count })
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Primary endpoint for `wire_key`
    ///
    /// `access` does not influence the result: writes land where a later
    /// read will look.
    pub fn select(&self, wire_key: &str, _access: Access) -> usize {
        if self.shard_count == 1 {
            return 0;
        }
        crc32fast::hash(wire_key.as_bytes()) as usize % self.shard_count
    }

    /// Next candidate in ring order that `ctx` has not tried yet
    pub fn select_excluding(
        &self,
        wire_key: &str,
        access: Access,
        ctx: &RetryContext,
    ) -> Result<usize> {
        let start = self.select(wire_key, access);
        (0..self.shard_count)
            .map(|offset| (start + offset) % self.shard_count)
            .find(|index| !ctx.has_tried(*index))
            .ok_or_else(|| {
                CacheError::NoEndpointsAvailable(format!(
                    "all {} endpoint(s) failed for key {}",
                    self.shard_count, wire_key
                ))
            })
    }
}
