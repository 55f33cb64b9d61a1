//! Serializer strategies

use std::fmt;
use std::str::FromStr;

use crate::error::{CacheError, Result};

use super::Value;

/// Turns a [`Value`] into bytes and back
pub trait Serializer: Send + Sync + fmt::Debug {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Value>;
}

/// Compact binary encoding (bincode)
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeSerializer;

impl Serializer for BincodeSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        bincode::deserialize(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

/// JSON encoding, readable from other languages
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

/// Serializer id as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerKind {
    Bincode,
    Json,
}

impl SerializerKind {
    pub fn build(self) -> Box<dyn Serializer> {
        match self {
            SerializerKind::Bincode => Box::new(BincodeSerializer),
            SerializerKind::Json => Box::new(JsonSerializer),
        }
    }
}

impl FromStr for SerializerKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bincode" => Ok(SerializerKind::Bincode),
            "json" => Ok(SerializerKind::Json),
            other => Err(CacheError::Config(format!("unknown serializer '{}'", other))),
        }
    }
}
