//! Key encoding
//!
//! Builds the wire key from `(prefix, version, logical key)`:
//!
//! ```text
//! <prefix>:<version>:<logical key>
//! ```
//!
//! The version is rendered as a decimal integer, which never contains `:`,
//! so for a fixed prefix two distinct `(version, key)` pairs can never produce
//! the same wire key. Bumping the version stops addressing old keys; they are
//! left to expire through their TTL.

use std::borrow::Cow;

use crate::error::{CacheError, Result};

/// Caller-facing key: logical key plus optional version and prefix overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey<'a> {
    pub key: Cow<'a, str>,
    pub version: Option<i64>,
    pub prefix: Option<Cow<'a, str>>,
}

impl<'a> CacheKey<'a> {
    pub fn new(key: impl Into<Cow<'a, str>>) -> Self {
        Self {
            key: key.into(),
            version: None,
            prefix: None,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<Cow<'a, str>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

impl<'a> From<&'a str> for CacheKey<'a> {
    fn from(key: &'a str) -> Self {
        CacheKey::new(key)
    }
}

impl<'a> From<&'a String> for CacheKey<'a> {
    fn from(key: &'a String) -> Self {
        CacheKey::new(key.as_str())
    }
}

impl From<String> for CacheKey<'static> {
    fn from(key: String) -> Self {
        CacheKey::new(key)
    }
}

impl<'a> From<(&'a str, i64)> for CacheKey<'a> {
    fn from((key, version): (&'a str, i64)) -> Self {
        CacheKey::new(key).with_version(version)
    }
}

/// Encodes logical keys with the configured defaults
#[derive(Debug, Clone)]
pub struct KeyEncoder {
    prefix: String,
    version: i64,
    max_length: usize,
}

impl KeyEncoder {
    pub fn new(prefix: impl Into<String>, version: i64, max_length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            version,
            max_length,
        }
    }

    /// Wire key for `key`, applying defaults for unset version/prefix
    pub fn make_key(&self, key: &CacheKey<'_>) -> Result<String> {
        let prefix = key.prefix.as_deref().unwrap_or(self.prefix.as_str());
        let version = key.version.unwrap_or(self.version);
        encode_key(prefix, version, &key.key, self.max_length)
    }

    /// Wire key for a plain logical key under an explicit version override
    pub fn make_versioned(&self, key: &str, version: Option<i64>) -> Result<String> {
        encode_key(
            &self.prefix,
            version.unwrap_or(self.version),
            key,
            self.max_length,
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> i64 {
        self.version
    }
}

/// Pure key encoding function
///
/// Fails with `InvalidKey` on an empty logical key or when the wire key
/// exceeds `max_length` bytes.
pub fn encode_key(prefix: &str, version: i64, key: &str, max_length: usize) -> Result<String> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("empty key".to_string()));
    }

    let wire_key = format!("{}:{}:{}", prefix, version, key);
    if wire_key.len() > max_length {
        return Err(CacheError::InvalidKey(format!(
            "key of {} bytes exceeds maximum of {} bytes",
            wire_key.len(),
            max_length
        )));
    }

    Ok(wire_key)
}
