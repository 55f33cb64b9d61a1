//! Codec Module
//!
//! Serialize-then-compress pipeline applied to every stored value.
//!
//! ## Payload Format
//! ```text
//! Int values:   ASCII decimal, e.g. b"-42"          (no envelope)
//! Other values: ┌─────────┬─────────────────────────┐
//!               │ Tag (1) │  Body                   │
//!               └─────────┴─────────────────────────┘
//!   0x00 = body is the serialized value
//!   0x01 = body is the compressed serialized value
//! ```
//!
//! Tags are never ASCII digits or `-`, so decode can tell integer payloads
//! from enveloped ones without guessing.

mod compressor;
mod serializer;
mod value;

pub use compressor::{
    Compressor, CompressorKind, GzipCompressor, Lz4Compressor, NoCompressor, ZstdCompressor,
};
pub use serializer::{BincodeSerializer, JsonSerializer, Serializer, SerializerKind};
pub use value::Value;

use crate::config::ClientConfig;
use crate::error::{CacheError, Result};

const TAG_RAW: u8 = 0x00;
const TAG_COMPRESSED: u8 = 0x01;

/// Serializer + compressor composition
#[derive(Debug)]
pub struct Codec {
    serializer: Box<dyn Serializer>,
    compressor: Box<dyn Compressor>,
    min_size: usize,
}

impl Codec {
    pub fn new(
        serializer: Box<dyn Serializer>,
        compressor: Box<dyn Compressor>,
        min_size: usize,
    ) -> Self {
        Self {
            serializer,
            compressor,
            min_size,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.serializer.build(),
            config.compressor.build(),
            config.compression_min_size,
        )
    }

    /// Encode a value: serialize, then compress when the payload is large enough
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        if let Value::Int(i) = value {
            return Ok(i.to_string().into_bytes());
        }

        let body = self.serializer.serialize(value)?;

        if self.compressor.is_noop() || body.len() < self.min_size {
            return Ok(envelope(TAG_RAW, &body));
        }

        let compressed = self.compressor.compress(&body)?;
        Ok(envelope(TAG_COMPRESSED, &compressed))
    }

    /// Exact inverse of [`Codec::encode`]
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        if let Some(i) = parse_int(bytes) {
            return Ok(Value::Int(i));
        }

        match bytes.split_first() {
            None => Err(CacheError::Serialization("empty payload".to_string())),
            Some((&TAG_RAW, body)) => self.serializer.deserialize(body),
            Some((&TAG_COMPRESSED, body)) => {
                let body = self.compressor.decompress(body)?;
                self.serializer.deserialize(&body)
            }
            Some((tag, _)) => Err(CacheError::Serialization(format!(
                "unknown payload tag 0x{:02x}",
                tag
            ))),
        }
    }

    pub fn encode_all<'v, I>(&self, values: I) -> Result<Vec<Vec<u8>>>
    where
        I: IntoIterator<Item = &'v Value>,
    {
        values.into_iter().map(|v| self.encode(v)).collect()
    }

    pub fn decode_all(&self, payloads: Vec<Vec<u8>>) -> Result<Vec<Value>> {
        payloads.iter().map(|p| self.decode(p)).collect()
    }
}

fn envelope(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(tag);
    out.extend_from_slice(body);
    out
}

fn parse_int(bytes: &[u8]) -> Option<i64> {
    let first = *bytes.first()?;
    if !(first.is_ascii_digit() || first == b'-') {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
