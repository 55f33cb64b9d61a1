//! Engine Module
//!
//! In-memory command engine: a keyspace of strings, lists, hashes, sets and
//! sorted sets with lazy expiry, executing [`Command`]s with Redis-compatible
//! semantics. Each database of a [`crate::backend::MemoryBackend`] server is
//! one engine.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader
//!
//! - Read-only commands take the keyspace read lock; expired entries are
//!   treated as absent but left in place
//! - Mutating commands take the write lock and purge an expired entry before
//!   touching it

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::BackendError;
use crate::protocol::{format_float, Command, InsertPosition, Reply, SetCondition};

pub const ERR_WRONG_TYPE: &str =
    "WRONGTYPE Operation against a key holding the wrong kind of value";
pub const ERR_NOT_INTEGER: &str = "ERR value is not an integer or out of range";
pub const ERR_INDEX_OUT_OF_RANGE: &str = "ERR index out of range";
pub const ERR_NO_SUCH_KEY: &str = "ERR no such key";
pub const ERR_NAN_SCORE: &str = "ERR resulting score is not a number (NaN)";

type Bytes = Vec<u8>;
type Keyspace = HashMap<Bytes, Entry>;
type EngineResult = Result<Reply, BackendError>;

fn command_error(message: &str) -> BackendError {
    BackendError::Command(message.to_string())
}

// =============================================================================
// Stored Entries
// =============================================================================

#[derive(Debug, Clone)]
enum Data {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Hash(BTreeMap<Bytes, Bytes>),
    Set(BTreeSet<Bytes>),
    /// Kept sorted by (score, member)
    ZSet(Vec<(f64, Bytes)>),
}

#[derive(Debug, Clone)]
struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    fn is_empty_collection(&self) -> bool {
        match &self.data {
            Data::Str(_) => false,
            Data::List(l) => l.is_empty(),
            Data::Hash(h) => h.is_empty(),
            Data::Set(s) => s.is_empty(),
            Data::ZSet(z) => z.is_empty(),
        }
    }
}

macro_rules! typed_accessors {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        fn $get(entry: Option<&Entry>) -> Result<Option<&$ty>, BackendError> {
            match entry.map(|e| &e.data) {
                None => Ok(None),
                Some(Data::$variant(v)) => Ok(Some(v)),
                Some(_) => Err(command_error(ERR_WRONG_TYPE)),
            }
        }

        fn $get_mut(entry: Option<&mut Entry>) -> Result<Option<&mut $ty>, BackendError> {
            match entry.map(|e| &mut e.data) {
                None => Ok(None),
                Some(Data::$variant(v)) => Ok(Some(v)),
                Some(_) => Err(command_error(ERR_WRONG_TYPE)),
            }
        }
    };
}

typed_accessors!(as_list, as_list_mut, List, VecDeque<Bytes>);
typed_accessors!(as_hash, as_hash_mut, Hash, BTreeMap<Bytes, Bytes>);
typed_accessors!(as_set, as_set_mut, Set, BTreeSet<Bytes>);
typed_accessors!(as_zset, as_zset_mut, ZSet, Vec<(f64, Bytes)>);

// =============================================================================
// Index Helpers
// =============================================================================

/// Resolve an inclusive `[start, stop]` range with negative-from-end indices
fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start >= len || start > stop || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&resolved).then(|| resolved as usize)
}

fn bulk_array<'a, I: IntoIterator<Item = &'a Bytes>>(items: I) -> Reply {
    Reply::Array(items.into_iter().cloned().map(Reply::Bulk).collect())
}

fn sort_zset(members: &mut [(f64, Bytes)]) {
    members.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
}

// =============================================================================
// Engine
// =============================================================================

/// The in-memory command engine
#[derive(Debug, Default)]
pub struct Engine {
    keyspace: RwLock<Keyspace>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        let now = Instant::now();
        self.keyspace
            .read()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Execute a command
    ///
    /// Routes read-only commands through the read lock, everything else
    /// through the write lock.
    pub fn execute(&self, command: &Command) -> EngineResult {
        let now = Instant::now();
        if let Some(reply) = self.execute_read(command, now) {
            return reply;
        }

        let mut keyspace = self.keyspace.write();
        Self::execute_write(&mut keyspace, command, now)
    }

    fn execute_read(&self, command: &Command, now: Instant) -> Option<EngineResult> {
        let keyspace = self.keyspace.read();
        let live = |key: &Bytes| keyspace.get(key).filter(|e| !e.is_expired(now));

        let reply = match command {
            Command::Ping => Ok(Reply::Bulk(b"PONG".to_vec())),
            Command::Get { key } => match live(key).map(|e| &e.data) {
                None => Ok(Reply::Nil),
                Some(Data::Str(v)) => Ok(Reply::Bulk(v.clone())),
                Some(_) => Err(command_error(ERR_WRONG_TYPE)),
            },
            Command::Exists { key } => Ok(Reply::Int(live(key).is_some() as i64)),
            Command::PTtl { key } => Ok(Reply::Int(match live(key) {
                None => -2,
                Some(Entry { expires_at: None, .. }) => -1,
                Some(Entry { expires_at: Some(at), .. }) => {
                    at.saturating_duration_since(now).as_millis() as i64
                }
            })),
            Command::MGet { keys } => Ok(Reply::Array(
                keys.iter()
                    .map(|k| match live(k).map(|e| &e.data) {
                        Some(Data::Str(v)) => Reply::Bulk(v.clone()),
                        _ => Reply::Nil,
                    })
                    .collect(),
            )),
            Command::LLen { key } => {
                as_list(live(key)).map(|l| Reply::Int(l.map_or(0, |l| l.len() as i64)))
            }
            Command::LRange { key, start, stop } => as_list(live(key)).map(|list| {
                let list = match list {
                    Some(l) => l,
                    None => return Reply::Array(Vec::new()),
                };
                match normalize_range(*start, *stop, list.len()) {
                    Some((s, e)) => bulk_array(list.range(s..=e)),
                    None => Reply::Array(Vec::new()),
                }
            }),
            Command::LIndex { key, index } => as_list(live(key)).map(|list| {
                list.and_then(|l| normalize_index(*index, l.len()).map(|i| Reply::Bulk(l[i].clone())))
                    .unwrap_or(Reply::Nil)
            }),
            Command::HGet { key, field } => as_hash(live(key)).map(|h| {
                h.and_then(|h| h.get(field))
                    .map_or(Reply::Nil, |v| Reply::Bulk(v.clone()))
            }),
            Command::HLen { key } => {
                as_hash(live(key)).map(|h| Reply::Int(h.map_or(0, |h| h.len() as i64)))
            }
            Command::HKeys { key } => as_hash(live(key))
                .map(|h| h.map_or(Reply::Array(Vec::new()), |h| bulk_array(h.keys()))),
            Command::HExists { key, field } => as_hash(live(key))
                .map(|h| Reply::Int(h.map_or(false, |h| h.contains_key(field)) as i64)),
            Command::HGetAll { key } => as_hash(live(key)).map(|h| {
                h.map_or(Reply::Array(Vec::new()), |h| {
                    bulk_array(h.iter().flat_map(|(f, v)| [f, v]))
                })
            }),
            Command::SMembers { key } => as_set(live(key))
                .map(|s| s.map_or(Reply::Array(Vec::new()), |s| bulk_array(s.iter()))),
            Command::SIsMember { key, member } => as_set(live(key))
                .map(|s| Reply::Int(s.map_or(false, |s| s.contains(member)) as i64)),
            Command::SCard { key } => {
                as_set(live(key)).map(|s| Reply::Int(s.map_or(0, |s| s.len() as i64)))
            }
            Command::ZScore { key, member } => as_zset(live(key)).map(|z| {
                z.and_then(|z| z.iter().find(|(_, m)| m == member))
                    .map_or(Reply::Nil, |(score, _)| Reply::Bulk(format_float(*score)))
            }),
            Command::ZRange { key, start, stop, with_scores } => as_zset(live(key)).map(|z| {
                let z = match z {
                    Some(z) => z,
                    None => return Reply::Array(Vec::new()),
                };
                let (s, e) = match normalize_range(*start, *stop, z.len()) {
                    Some(range) => range,
                    None => return Reply::Array(Vec::new()),
                };
                let mut out = Vec::new();
                for (score, member) in &z[s..=e] {
                    out.push(Reply::Bulk(member.clone()));
                    if *with_scores {
                        out.push(Reply::Bulk(format_float(*score)));
                    }
                }
                Reply::Array(out)
            }),
            Command::ZCard { key } => {
                as_zset(live(key)).map(|z| Reply::Int(z.map_or(0, |z| z.len() as i64)))
            }
            _ => return None,
        };
        Some(reply)
    }

    fn execute_write(keyspace: &mut Keyspace, command: &Command, now: Instant) -> EngineResult {
        // Purge an expired entry before mutating it
        let purge = |keyspace: &mut Keyspace, key: &Bytes| {
            if keyspace.get(key).map_or(false, |e| e.is_expired(now)) {
                keyspace.remove(key);
            }
        };

        let reply = match command {
            Command::Set { key, value, expiry_ms, condition } => {
                purge(keyspace, key);
                let exists = keyspace.contains_key(key);
                let allowed = match condition {
                    SetCondition::Always => true,
                    SetCondition::IfAbsent => !exists,
                    SetCondition::IfExists => exists,
                };
                if !allowed {
                    return Ok(Reply::Nil);
                }
                let mut entry = Entry::new(Data::Str(value.clone()));
                entry.expires_at = expiry_ms.map(|ms| now + Duration::from_millis(ms));
                keyspace.insert(key.clone(), entry);
                Ok(Reply::Ok)
            }
            Command::Del { keys } => {
                let mut removed = 0;
                for key in keys {
                    purge(keyspace, key);
                    if keyspace.remove(key).is_some() {
                        removed += 1;
                    }
                }
                Ok(Reply::Int(removed))
            }
            Command::IncrBy { key, delta } => {
                purge(keyspace, key);
                let entry = keyspace
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(Data::Str(b"0".to_vec())));
                let current = match &entry.data {
                    Data::Str(raw) => std::str::from_utf8(raw)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| command_error(ERR_NOT_INTEGER))?,
                    _ => return Err(command_error(ERR_WRONG_TYPE)),
                };
                let next = current
                    .checked_add(*delta)
                    .ok_or_else(|| command_error("ERR increment or decrement would overflow"))?;
                entry.data = Data::Str(next.to_string().into_bytes());
                Ok(Reply::Int(next))
            }
            Command::PExpire { key, ms } => {
                purge(keyspace, key);
                if !keyspace.contains_key(key) {
                    return Ok(Reply::Int(0));
                }
                if *ms == 0 {
                    keyspace.remove(key);
                } else if let Some(entry) = keyspace.get_mut(key) {
                    entry.expires_at = Some(now + Duration::from_millis(*ms));
                }
                Ok(Reply::Int(1))
            }
            Command::Persist { key } => {
                purge(keyspace, key);
                let cleared = keyspace
                    .get_mut(key)
                    .and_then(|e| e.expires_at.take())
                    .is_some();
                Ok(Reply::Int(cleared as i64))
            }
            Command::MSet { entries, expiry_ms } => {
                for (key, value) in entries {
                    let mut entry = Entry::new(Data::Str(value.clone()));
                    entry.expires_at = expiry_ms.map(|ms| now + Duration::from_millis(ms));
                    keyspace.insert(key.clone(), entry);
                }
                Ok(Reply::Ok)
            }
            Command::FlushDb => {
                keyspace.clear();
                Ok(Reply::Ok)
            }

            // -----------------------------------------------------------------
            // Lists
            // -----------------------------------------------------------------
            Command::LPush { key, values } | Command::RPush { key, values } => {
                purge(keyspace, key);
                let front = matches!(command, Command::LPush { .. });
                let entry = keyspace
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(Data::List(VecDeque::new())));
                let list = as_list_mut(Some(entry))?.ok_or_else(|| command_error(ERR_NO_SUCH_KEY))?;
                for value in values {
                    if front {
                        list.push_front(value.clone());
                    } else {
                        list.push_back(value.clone());
                    }
                }
                Ok(Reply::Int(list.len() as i64))
            }
            Command::LPop { key, count } | Command::RPop { key, count } => {
                purge(keyspace, key);
                let front = matches!(command, Command::LPop { .. });
                let list = match as_list_mut(keyspace.get_mut(key))? {
                    Some(l) => l,
                    None => return Ok(Reply::Nil),
                };
                let mut pop = || if front { list.pop_front() } else { list.pop_back() };
                let reply = match count {
                    None => pop().map_or(Reply::Nil, Reply::Bulk),
                    Some(n) => Reply::Array((0..*n).map_while(|_| pop()).map(Reply::Bulk).collect()),
                };
                Ok(reply)
            }
            Command::LSet { key, index, value } => {
                purge(keyspace, key);
                let list = as_list_mut(keyspace.get_mut(key))?
                    .ok_or_else(|| command_error(ERR_NO_SUCH_KEY))?;
                let i = normalize_index(*index, list.len())
                    .ok_or_else(|| command_error(ERR_INDEX_OUT_OF_RANGE))?;
                list[i] = value.clone();
                Ok(Reply::Ok)
            }
            Command::LRem { key, count, value } => {
                purge(keyspace, key);
                let list = match as_list_mut(keyspace.get_mut(key))? {
                    Some(l) => l,
                    None => return Ok(Reply::Int(0)),
                };
                let limit = if *count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
                let mut removed = 0usize;
                if *count >= 0 {
                    let mut i = 0;
                    while i < list.len() && removed < limit {
                        if &list[i] == value {
                            list.remove(i);
                            removed += 1;
                        } else {
                            i += 1;
                        }
                    }
                } else {
                    let mut i = list.len();
                    while i > 0 && removed < limit {
                        i -= 1;
                        if &list[i] == value {
                            list.remove(i);
                            removed += 1;
                        }
                    }
                }
                Ok(Reply::Int(removed as i64))
            }
            Command::LTrim { key, start, stop } => {
                purge(keyspace, key);
                if let Some(list) = as_list_mut(keyspace.get_mut(key))? {
                    match normalize_range(*start, *stop, list.len()) {
                        Some((s, e)) => {
                            list.truncate(e + 1);
                            list.drain(..s);
                        }
                        None => list.clear(),
                    }
                }
                Ok(Reply::Ok)
            }
            Command::LInsert { key, position, pivot, value } => {
                purge(keyspace, key);
                let list = match as_list_mut(keyspace.get_mut(key))? {
                    Some(l) => l,
                    None => return Ok(Reply::Int(0)),
                };
                match list.iter().position(|v| v == pivot) {
                    None => Ok(Reply::Int(-1)),
                    Some(at) => {
                        let at = match position {
                            InsertPosition::Before => at,
                            InsertPosition::After => at + 1,
                        };
                        list.insert(at, value.clone());
                        Ok(Reply::Int(list.len() as i64))
                    }
                }
            }

            // -----------------------------------------------------------------
            // Hashes
            // -----------------------------------------------------------------
            Command::HSet { key, field, value } => {
                purge(keyspace, key);
                let entry = keyspace
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(Data::Hash(BTreeMap::new())));
                let hash = as_hash_mut(Some(entry))?.ok_or_else(|| command_error(ERR_NO_SUCH_KEY))?;
                let added = hash.insert(field.clone(), value.clone()).is_none();
                Ok(Reply::Int(added as i64))
            }
            Command::HDel { key, fields } => {
                purge(keyspace, key);
                let removed = match as_hash_mut(keyspace.get_mut(key))? {
                    Some(h) => fields.iter().filter(|f| h.remove(*f).is_some()).count(),
                    None => 0,
                };
                Ok(Reply::Int(removed as i64))
            }

            // -----------------------------------------------------------------
            // Sets
            // -----------------------------------------------------------------
            Command::SAdd { key, members } => {
                purge(keyspace, key);
                let entry = keyspace
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(Data::Set(BTreeSet::new())));
                let set = as_set_mut(Some(entry))?.ok_or_else(|| command_error(ERR_NO_SUCH_KEY))?;
                let added = members.iter().filter(|m| set.insert((*m).clone())).count();
                Ok(Reply::Int(added as i64))
            }
            Command::SRem { key, members } => {
                purge(keyspace, key);
                let removed = match as_set_mut(keyspace.get_mut(key))? {
                    Some(s) => members.iter().filter(|m| s.remove(*m)).count(),
                    None => 0,
                };
                Ok(Reply::Int(removed as i64))
            }
            Command::SPop { key } => {
                purge(keyspace, key);
                let popped = match as_set_mut(keyspace.get_mut(key))? {
                    Some(s) => s.pop_first(),
                    None => None,
                };
                Ok(popped.map_or(Reply::Nil, Reply::Bulk))
            }

            // -----------------------------------------------------------------
            // Sorted Sets
            // -----------------------------------------------------------------
            Command::ZAdd { key, members } => {
                if members.iter().any(|(score, _)| score.is_nan()) {
                    return Err(command_error(ERR_NAN_SCORE));
                }
                purge(keyspace, key);
                let entry = keyspace
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(Data::ZSet(Vec::new())));
                let zset = as_zset_mut(Some(entry))?.ok_or_else(|| command_error(ERR_NO_SUCH_KEY))?;
                let mut added = 0;
                for (score, member) in members {
                    match zset.iter_mut().find(|(_, m)| m == member) {
                        Some(existing) => existing.0 = *score,
                        None => {
                            zset.push((*score, member.clone()));
                            added += 1;
                        }
                    }
                }
                sort_zset(zset);
                Ok(Reply::Int(added))
            }
            Command::ZRem { key, members } => {
                purge(keyspace, key);
                let removed = match as_zset_mut(keyspace.get_mut(key))? {
                    Some(z) => {
                        let before = z.len();
                        z.retain(|(_, m)| !members.contains(m));
                        before - z.len()
                    }
                    None => 0,
                };
                Ok(Reply::Int(removed as i64))
            }
            Command::ZIncrBy { key, delta, member } => {
                purge(keyspace, key);
                let entry = keyspace
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(Data::ZSet(Vec::new())));
                let zset = as_zset_mut(Some(entry))?.ok_or_else(|| command_error(ERR_NO_SUCH_KEY))?;
                let score = match zset.iter_mut().find(|(_, m)| m == member) {
                    Some(existing) => {
                        existing.0 += *delta;
                        existing.0
                    }
                    None => {
                        zset.push((*delta, member.clone()));
                        *delta
                    }
                };
                if score.is_nan() {
                    return Err(command_error(ERR_NAN_SCORE));
                }
                sort_zset(zset);
                Ok(Reply::Bulk(format_float(score)))
            }

            other => Err(BackendError::Command(format!(
                "ERR unhandled command '{}'",
                other.name()
            ))),
        };

        // Collections that became empty disappear, as in Redis
        if let Some(key) = mutated_key(command) {
            if keyspace.get(key).map_or(false, Entry::is_empty_collection) {
                keyspace.remove(key);
            }
        }

        reply
    }
}

fn mutated_key(command: &Command) -> Option<&Bytes> {
    match command {
        Command::LPush { key, .. }
        | Command::RPush { key, .. }
        | Command::LPop { key, .. }
        | Command::RPop { key, .. }
        | Command::LRem { key, .. }
        | Command::LTrim { key, .. }
        | Command::HDel { key, .. }
        | Command::SRem { key, .. }
        | Command::SPop { key }
        | Command::ZRem { key, .. } => Some(key),
        _ => None,
    }
}
