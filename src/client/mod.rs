//! Operation Dispatcher
//!
//! [`CacheClient`] is the public cache surface. Every operation follows the
//! same path:
//!
//! ```text
//! logical key ──► KeyEncoder ──► wire key ──► ShardRouter ──► endpoint index
//!                                                                  │
//! value ──► Codec::encode ──► Command ──► ConnectionPool::execute ◄─┘
//!                                                  │
//! result ◄── Codec::decode ◄── Reply ◄─────────────┘
//! ```
//!
//! ## Failure Contract
//! - Key and codec errors propagate immediately and are never retried
//! - A connectivity failure moves on to the next endpoint in ring order;
//!   with a single endpoint it surfaces as `ConnectionInterrupted`, and
//!   once every endpoint has failed as `NoEndpointsAvailable`
//! - Backend command errors surface as `BackendCommand` (or
//!   `IndexOutOfRange` for `lset`) without retry
//! - With `ignore_exceptions`, connection errors are swallowed and each
//!   operation returns its documented default
//!
//! Operations are split by data-type family: `scalar`, `batch`, `lists`,
//! `hashes`, `sets`, `sorted_sets`.

mod batch;
mod hashes;
mod lists;
mod scalar;
mod sets;
mod sorted_sets;

use std::time::Duration;

use crate::backend::{Backend, ConnectOptions};
use crate::codec::{Codec, Value};
use crate::config::ClientConfig;
use crate::endpoint::{parse_locations, ServerEndpoint};
use crate::error::{BackendError, CacheError, Result};
use crate::key::{CacheKey, KeyEncoder};
use crate::pool::ConnectionPool;
use crate::protocol::{Command, Reply};
use crate::router::{Access, RetryContext, ShardRouter};

// =============================================================================
// Expiry
// =============================================================================

/// Expiry requested for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Use `ClientConfig::default_timeout`
    #[default]
    Default,

    /// Keep until deleted or evicted
    Never,

    /// Expire after the given duration. `Duration::ZERO` removes the key.
    After(Duration),
}

impl From<Duration> for Expiry {
    fn from(d: Duration) -> Self {
        Expiry::After(d)
    }
}

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

/// Resolved expiry, in wire terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireExpiry {
    Keep,
    Millis(u64),
    /// Zero duration: the write becomes a delete
    Immediately,
}

fn millis(d: Duration) -> u64 {
    let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
    // sub-millisecond expiries round up to 1ms
    if ms == 0 && !d.is_zero() {
        1
    } else {
        ms
    }
}

// =============================================================================
// Client
// =============================================================================

/// Sharded cache client over a [`Backend`]
pub struct CacheClient<B: Backend> {
    config: ClientConfig,
    keys: KeyEncoder,
    codec: Codec,
    router: ShardRouter,
    pool: ConnectionPool<B>,
}

impl<B: Backend> CacheClient<B> {
    /// Build a client using the codec named by `config`
    pub fn new(backend: B, config: ClientConfig) -> Result<Self> {
        let codec = Codec::from_config(&config);
        Self::with_codec(backend, config, codec)
    }

    /// Build a client with a custom serializer/compressor composition
    ///
    /// Every configuration problem, including endpoints the backend cannot
    /// serve, is reported here as `CacheError::Config`.
    pub fn with_codec(backend: B, config: ClientConfig, codec: Codec) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(CacheError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let endpoints = parse_locations(&config.locations)?;
        let router = ShardRouter::new(endpoints.len())?;
        for endpoint in &endpoints {
            backend.check(endpoint).map_err(|e| {
                CacheError::Config(format!(
                    "{} backend cannot serve {}: {}",
                    backend.name(),
                    endpoint,
                    e
                ))
            })?;
        }
        let keys = KeyEncoder::new(
            config.key_prefix.clone(),
            config.version,
            config.max_key_length,
        );

        tracing::debug!(
            "Cache client over {} backend with {} endpoint(s): {}",
            backend.name(),
            endpoints.len(),
            endpoints
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let pool = ConnectionPool::new(backend, endpoints, ConnectOptions::from_config(&config));
        Ok(Self {
            config,
            keys,
            codec,
            router,
            pool,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &[ServerEndpoint] {
        self.pool.endpoints()
    }

    pub fn pool(&self) -> &ConnectionPool<B> {
        &self.pool
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Wire key for `key` under the configured prefix and version
    pub fn make_key<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<String> {
        self.keys.make_key(&key.into())
    }

    /// Index of the endpoint that owns `key`
    pub fn shard_for<'k>(&self, key: impl Into<CacheKey<'k>>) -> Result<usize> {
        let wire = self.make_key(key)?;
        Ok(self.router.select(&wire, Access::Read))
    }

    /// Close every backend connection. Never fails; safe to call twice.
    pub fn close(&self) {
        self.pool.close_all();
    }

    // =========================================================================
    // Dispatch Plumbing
    // =========================================================================

    fn wire_key(&self, key: &CacheKey<'_>) -> Result<String> {
        self.keys.make_key(key)
    }

    fn resolve_expiry(&self, expiry: Expiry) -> WireExpiry {
        let duration = match expiry {
            Expiry::Never => None,
            Expiry::After(d) => Some(d),
            Expiry::Default => self.config.default_timeout,
        };
        match duration {
            None => WireExpiry::Keep,
            Some(d) if d.is_zero() => WireExpiry::Immediately,
            Some(d) => WireExpiry::Millis(millis(d)),
        }
    }

    /// One round trip to endpoint `index`, retried once on timeout when
    /// `retry_on_timeout` is set
    fn call_shard(&self, index: usize, command: &Command) -> std::result::Result<Reply, BackendError> {
        match self.pool.execute(index, command) {
            Err(e) if e.is_timeout() && self.config.retry_on_timeout => {
                tracing::debug!(
                    "{} timed out on {}, retrying once",
                    command.name(),
                    self.pool.address(index)
                );
                self.pool.execute(index, command)
            }
            other => other,
        }
    }

    /// Run `command` on the shard owning `wire_key`, failing over in ring
    /// order on connectivity errors
    fn run<T, F>(&self, wire_key: &str, access: Access, command: &Command, convert: F) -> Result<T>
    where
        F: Fn(Reply) -> std::result::Result<T, BackendError>,
    {
        let mut ctx = RetryContext::new();
        let mut index = self.router.select(wire_key, access);

        loop {
            ctx.mark_tried(index);
            let error = match self.call_shard(index, command).and_then(&convert) {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            self.discard_if_malformed(index, &error);
            let address = self.pool.address(index);
            if !error.is_connectivity() || self.router.shard_count() == 1 {
                return Err(error.into_cache_error(&address));
            }

            tracing::warn!(
                "{} failed on {}: {}; trying next endpoint",
                command.name(),
                address,
                error
            );
            index = self.router.select_excluding(wire_key, access, &ctx)?;
            tracing::debug!("Failing over to {}", self.pool.address(index));
        }
    }

    /// A reply that could not be converted leaves the session in an unknown
    /// state; the next call on `index` reconnects
    fn discard_if_malformed(&self, index: usize, error: &BackendError) {
        if matches!(error, BackendError::Protocol(_)) {
            self.pool.release(index);
        }
    }

    /// Apply the ignore-mode policy around one operation
    fn guarded<T>(
        &self,
        operation: &str,
        default: impl FnOnce() -> T,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        match body() {
            Err(e) if self.config.ignore_exceptions && e.is_connection_error() => {
                if self.config.log_ignored_exceptions {
                    tracing::warn!("Ignoring error in {}: {}", operation, e);
                }
                Ok(default())
            }
            other => other,
        }
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        self.codec.encode(value)
    }

    fn decode_optional(&self, payload: Option<Vec<u8>>) -> Result<Option<Value>> {
        payload.map(|p| self.codec.decode(&p)).transpose()
    }
}

fn key_bytes(wire_key: &str) -> Vec<u8> {
    wire_key.as_bytes().to_vec()
}
