//! Compressor strategies

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{CacheError, Result};

/// Compresses serialized payloads
pub trait Compressor: Send + Sync + fmt::Debug {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// A no-op compressor never tags payloads as compressed
    fn is_noop(&self) -> bool {
        false
    }
}

fn compression_error(e: impl fmt::Display) -> CacheError {
    CacheError::Compression(e.to_string())
}

/// Identity compressor
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompressor;

impl Compressor for NoCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: u32,
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(data).map_err(compression_error)?;
        encoder.finish().map_err(compression_error)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(compression_error)?;
        Ok(out)
    }
}

/// LZ4 block format with the uncompressed size prepended
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data).map_err(compression_error)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(compression_error)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(compression_error)
    }
}

/// Compressor id as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressorKind {
    None,
    Gzip,
    Lz4,
    Zstd,
}

impl CompressorKind {
    pub fn build(self) -> Box<dyn Compressor> {
        match self {
            CompressorKind::None => Box::new(NoCompressor),
            CompressorKind::Gzip => Box::new(GzipCompressor::default()),
            CompressorKind::Lz4 => Box::new(Lz4Compressor),
            CompressorKind::Zstd => Box::new(ZstdCompressor::default()),
        }
    }
}

impl FromStr for CompressorKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "identity" => Ok(CompressorKind::None),
            "gzip" => Ok(CompressorKind::Gzip),
            "lz4" => Ok(CompressorKind::Lz4),
            "zstd" => Ok(CompressorKind::Zstd),
            other => Err(CacheError::Config(format!("unknown compressor '{}'", other))),
        }
    }
}
