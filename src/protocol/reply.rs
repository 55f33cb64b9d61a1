//! Reply definitions
//!
//! Backend-native reply shapes, before the client decodes any values.

use crate::error::BackendError;

/// A command reply
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Absent key / element
    Nil,

    /// Status acknowledgement
    Ok,

    Int(i64),

    Bulk(Vec<u8>),

    Array(Vec<Reply>),
}

fn unexpected(expected: &str, got: &Reply) -> BackendError {
    BackendError::Protocol(format!("expected {} reply, got {:?}", expected, got))
}

impl Reply {
    pub fn into_int(self) -> Result<i64, BackendError> {
        match self {
            Reply::Int(i) => Ok(i),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Integer reply that must not be negative (lengths, counts)
    pub fn into_count(self) -> Result<u64, BackendError> {
        let value = self.into_int()?;
        u64::try_from(value)
            .map_err(|_| BackendError::Protocol(format!("negative count {}", value)))
    }

    pub fn into_bool(self) -> Result<bool, BackendError> {
        match self {
            Reply::Int(i) => Ok(i != 0),
            Reply::Ok => Ok(true),
            Reply::Nil => Ok(false),
            other => Err(unexpected("boolean", &other)),
        }
    }

    pub fn into_optional_bulk(self) -> Result<Option<Vec<u8>>, BackendError> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Bulk(b) => Ok(Some(b)),
            other => Err(unexpected("bulk", &other)),
        }
    }

    /// Array of bulk strings; `Nil` reads as empty
    pub fn into_bulk_array(self) -> Result<Vec<Vec<u8>>, BackendError> {
        match self {
            Reply::Nil => Ok(Vec::new()),
            Reply::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Reply::Bulk(b) => Ok(b),
                    other => Err(unexpected("bulk element", &other)),
                })
                .collect(),
            other => Err(unexpected("array", &other)),
        }
    }

    /// Array whose elements may be `Nil` (MGET)
    pub fn into_optional_bulk_array(self) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        match self {
            Reply::Array(items) => items.into_iter().map(Reply::into_optional_bulk).collect(),
            other => Err(unexpected("array", &other)),
        }
    }

    /// `Nil` stays `None`; a single bulk becomes a one-element vector
    pub fn into_optional_array(self) -> Result<Option<Vec<Vec<u8>>>, BackendError> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Bulk(b) => Ok(Some(vec![b])),
            array @ Reply::Array(_) => array.into_bulk_array().map(Some),
            other => Err(unexpected("array", &other)),
        }
    }

    /// Float encoded as a bulk string (ZSCORE, ZINCRBY)
    pub fn into_optional_float(self) -> Result<Option<f64>, BackendError> {
        match self.into_optional_bulk()? {
            None => Ok(None),
            Some(raw) => parse_float(&raw).map(Some),
        }
    }
}

pub fn parse_float(raw: &[u8]) -> Result<f64, BackendError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| BackendError::Protocol(format!("invalid float reply {:?}", raw)))
}

/// Render a score the way it travels on the wire
pub fn format_float(value: f64) -> Vec<u8> {
    value.to_string().into_bytes()
}
