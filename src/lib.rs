//! # shardcache
//!
//! A sharded cache client core with:
//! - Versioned, prefixed wire keys (bulk invalidation by bumping the version)
//! - Pluggable serialize-then-compress value codec
//! - Deterministic key-to-shard routing with ring-order failover
//! - One lazily opened connection per endpoint
//! - Interchangeable backends behind a minimal command surface
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  CacheClient (dispatcher)                    │
//! │   scalar · batch · lists · hashes · sets · sorted sets       │
//! └──────┬──────────────────┬───────────────────┬───────────────┘
//!        │                  │                   │
//!        ▼                  ▼                   ▼
//!  ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ KeyEncoder │   │ ShardRouter  │   │    Codec     │
//!  │ prefix:v:k │   │ crc32 % n    │   │ ser + compr  │
//!  └────────────┘   └──────┬───────┘   └──────────────┘
//!                          │
//!                          ▼
//!                 ┌─────────────────┐
//!                 │ ConnectionPool  │
//!                 │ (lock/endpoint) │
//!                 └────────┬────────┘
//!                          │ Backend / Connection
//!                 ┌────────┴────────┐
//!                 ▼                 ▼
//!           MemoryBackend      RedisBackend
//!             (Engine)       (feature "redis")
//! ```
//!
//! ## Example
//!
//! ```
//! use shardcache::{CacheClient, ClientConfig, Expiry, MemoryBackend};
//!
//! let config = ClientConfig::builder()
//!     .location("redis://10.0.0.1:6379,redis://10.0.0.2:6379")
//!     .key_prefix("app")
//!     .build();
//! let cache = CacheClient::new(MemoryBackend::new(), config).unwrap();
//!
//! cache.set("greeting", "hello", Expiry::Never).unwrap();
//! assert_eq!(cache.get("greeting").unwrap(), Some("hello".into()));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod endpoint;
pub mod key;
pub mod codec;
pub mod protocol;
pub mod engine;
pub mod backend;
pub mod pool;
pub mod router;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BackendError, CacheError, PartialResult, Result, ShardFailure};
pub use config::ClientConfig;
pub use endpoint::ServerEndpoint;
pub use key::{CacheKey, KeyEncoder};
pub use codec::{Codec, CompressorKind, SerializerKind, Value};
pub use backend::{Backend, Connection, MemoryBackend};
pub use client::{CacheClient, Expiry, KeyTtl};
pub use engine::Engine;

#[cfg(feature = "redis")]
pub use backend::RedisBackend;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of shardcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
