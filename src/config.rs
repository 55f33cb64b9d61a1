//! Configuration for shardcache clients
//!
//! Centralized configuration with sensible defaults. Settings loading is the
//! embedding application's job; this only holds the parsed options.

use std::time::Duration;

use crate::codec::{CompressorKind, SerializerKind};

/// Default backend port when a location omits it
pub const DEFAULT_PORT: u16 = 6379;

/// Main configuration for a cache client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Locations
    // -------------------------------------------------------------------------
    /// Location strings, one endpoint each (or comma-separated lists).
    /// More than one endpoint turns on sharding.
    pub locations: Vec<String>,

    // -------------------------------------------------------------------------
    // Codec Configuration
    // -------------------------------------------------------------------------
    /// Serializer strategy for non-integer values
    pub serializer: SerializerKind,

    /// Compressor strategy applied after serialization
    pub compressor: CompressorKind,

    /// Serialized payloads shorter than this are stored uncompressed (bytes)
    pub compression_min_size: usize,

    // -------------------------------------------------------------------------
    // Key Configuration
    // -------------------------------------------------------------------------
    /// Prefix prepended to every wire key
    pub key_prefix: String,

    /// Default key version
    pub version: i64,

    /// Keys longer than this (after prefixing) are rejected (bytes)
    pub max_key_length: usize,

    /// Expiry used by `Expiry::Default` (None = keys never expire)
    pub default_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Per-request read/write deadline (milliseconds, 0 = none)
    pub socket_timeout_ms: u64,

    /// Connect deadline (milliseconds, 0 = none)
    pub connect_timeout_ms: u64,

    /// Upper bound handed to backends that pool internally
    pub max_connections: usize,

    /// Retry a timed-out request once on the same endpoint before failing over
    pub retry_on_timeout: bool,

    // -------------------------------------------------------------------------
    // Failure Policy
    // -------------------------------------------------------------------------
    /// Swallow connection errors and return each operation's default value
    pub ignore_exceptions: bool,

    /// Log errors swallowed by `ignore_exceptions`
    pub log_ignored_exceptions: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            locations: vec![format!("redis://127.0.0.1:{}", DEFAULT_PORT)],
            serializer: SerializerKind::Bincode,
            compressor: CompressorKind::None,
            compression_min_size: 15,
            key_prefix: String::new(),
            version: 1,
            max_key_length: 1024,
            default_timeout: Some(Duration::from_secs(300)),
            socket_timeout_ms: 5000,
            connect_timeout_ms: 5000,
            max_connections: 50,
            retry_on_timeout: false,
            ignore_exceptions: false,
            log_ignored_exceptions: false,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn socket_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.socket_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    locations_set: bool,
}

impl ClientConfigBuilder {
    /// Add a location (replaces the default location on first call)
    pub fn location(mut self, location: impl Into<String>) -> Self {
        if !self.locations_set {
            self.config.locations.clear();
            self.locations_set = true;
        }
        self.config.locations.push(location.into());
        self
    }

    /// Replace all locations
    pub fn locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.locations = locations.into_iter().map(Into::into).collect();
        self.locations_set = true;
        self
    }

    pub fn serializer(mut self, kind: SerializerKind) -> Self {
        self.config.serializer = kind;
        self
    }

    pub fn compressor(mut self, kind: CompressorKind) -> Self {
        self.config.compressor = kind;
        self
    }

    /// Set the minimum payload size for compression (in bytes)
    pub fn compression_min_size(mut self, size: usize) -> Self {
        self.config.compression_min_size = size;
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    pub fn version(mut self, version: i64) -> Self {
        self.config.version = version;
        self
    }

    /// Set the maximum wire key length (in bytes)
    pub fn max_key_length(mut self, len: usize) -> Self {
        self.config.max_key_length = len;
        self
    }

    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Set the socket timeout (in milliseconds)
    pub fn socket_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_timeout_ms = ms;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    pub fn retry_on_timeout(mut self, enabled: bool) -> Self {
        self.config.retry_on_timeout = enabled;
        self
    }

    pub fn ignore_exceptions(mut self, enabled: bool) -> Self {
        self.config.ignore_exceptions = enabled;
        self
    }

    pub fn log_ignored_exceptions(mut self, enabled: bool) -> Self {
        self.config.log_ignored_exceptions = enabled;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
