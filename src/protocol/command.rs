//! Command definitions
//!
//! The minimal command surface every backend must serve. Keys, values and
//! members are raw bytes; the client has already encoded them.

type Bytes = Vec<u8>;

/// Conditional write for `Set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    Always,
    /// Only if the key does not exist (NX)
    IfAbsent,
    /// Only if the key already exists (XX)
    IfExists,
}

/// Where `LInsert` places the new element relative to the pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// A backend command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,

    // -------------------------------------------------------------------------
    // Keys / Strings
    // -------------------------------------------------------------------------
    Get { key: Bytes },
    Set { key: Bytes, value: Bytes, expiry_ms: Option<u64>, condition: SetCondition },
    Del { keys: Vec<Bytes> },
    Exists { key: Bytes },
    IncrBy { key: Bytes, delta: i64 },
    PExpire { key: Bytes, ms: u64 },
    PTtl { key: Bytes },
    Persist { key: Bytes },
    MGet { keys: Vec<Bytes> },
    MSet { entries: Vec<(Bytes, Bytes)>, expiry_ms: Option<u64> },
    FlushDb,

    // -------------------------------------------------------------------------
    // Lists
    // -------------------------------------------------------------------------
    LPush { key: Bytes, values: Vec<Bytes> },
    RPush { key: Bytes, values: Vec<Bytes> },
    LPop { key: Bytes, count: Option<usize> },
    RPop { key: Bytes, count: Option<usize> },
    LLen { key: Bytes },
    LRange { key: Bytes, start: i64, stop: i64 },
    LIndex { key: Bytes, index: i64 },
    LSet { key: Bytes, index: i64, value: Bytes },
    LRem { key: Bytes, count: i64, value: Bytes },
    LTrim { key: Bytes, start: i64, stop: i64 },
    LInsert { key: Bytes, position: InsertPosition, pivot: Bytes, value: Bytes },

    // -------------------------------------------------------------------------
    // Hashes
    // -------------------------------------------------------------------------
    HSet { key: Bytes, field: Bytes, value: Bytes },
    HGet { key: Bytes, field: Bytes },
    HDel { key: Bytes, fields: Vec<Bytes> },
    HLen { key: Bytes },
    HKeys { key: Bytes },
    HExists { key: Bytes, field: Bytes },
    HGetAll { key: Bytes },

    // -------------------------------------------------------------------------
    // Sets
    // -------------------------------------------------------------------------
    SAdd { key: Bytes, members: Vec<Bytes> },
    SRem { key: Bytes, members: Vec<Bytes> },
    SMembers { key: Bytes },
    SIsMember { key: Bytes, member: Bytes },
    SCard { key: Bytes },
    SPop { key: Bytes },

    // -------------------------------------------------------------------------
    // Sorted Sets
    // -------------------------------------------------------------------------
    ZAdd { key: Bytes, members: Vec<(f64, Bytes)> },
    ZRem { key: Bytes, members: Vec<Bytes> },
    ZScore { key: Bytes, member: Bytes },
    ZRange { key: Bytes, start: i64, stop: i64, with_scores: bool },
    ZCard { key: Bytes },
    ZIncrBy { key: Bytes, delta: f64, member: Bytes },
}

impl Command {
    /// Command name, as a Redis-compatible server spells it
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::IncrBy { .. } => "INCRBY",
            Command::PExpire { .. } => "PEXPIRE",
            Command::PTtl { .. } => "PTTL",
            Command::Persist { .. } => "PERSIST",
            Command::MGet { .. } => "MGET",
            Command::MSet { .. } => "MSET",
            Command::FlushDb => "FLUSHDB",
            Command::LPush { .. } => "LPUSH",
            Command::RPush { .. } => "RPUSH",
            Command::LPop { .. } => "LPOP",
            Command::RPop { .. } => "RPOP",
            Command::LLen { .. } => "LLEN",
            Command::LRange { .. } => "LRANGE",
            Command::LIndex { .. } => "LINDEX",
            Command::LSet { .. } => "LSET",
            Command::LRem { .. } => "LREM",
            Command::LTrim { .. } => "LTRIM",
            Command::LInsert { .. } => "LINSERT",
            Command::HSet { .. } => "HSET",
            Command::HGet { .. } => "HGET",
            Command::HDel { .. } => "HDEL",
            Command::HLen { .. } => "HLEN",
            Command::HKeys { .. } => "HKEYS",
            Command::HExists { .. } => "HEXISTS",
            Command::HGetAll { .. } => "HGETALL",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SMembers { .. } => "SMEMBERS",
            Command::SIsMember { .. } => "SISMEMBER",
            Command::SCard { .. } => "SCARD",
            Command::SPop { .. } => "SPOP",
            Command::ZAdd { .. } => "ZADD",
            Command::ZRem { .. } => "ZREM",
            Command::ZScore { .. } => "ZSCORE",
            Command::ZRange { .. } => "ZRANGE",
            Command::ZCard { .. } => "ZCARD",
            Command::ZIncrBy { .. } => "ZINCRBY",
        }
    }
}
