//! Redis/Valkey backend on top of the `redis` crate
//!
//! Maps each [`Command`] onto the matching server command and converts the
//! typed result back into a [`Reply`]. Only RESP2 reply shapes are assumed.

use redis::{Cmd, FromRedisValue, RedisError};

use crate::endpoint::ServerEndpoint;
use crate::error::BackendError;
use crate::protocol::{Command, InsertPosition, Reply, SetCondition};

use super::{Backend, ConnectOptions, Connection};

#[derive(Debug, Default, Clone, Copy)]
pub struct RedisBackend;

impl RedisBackend {
    pub fn new() -> Self {
        Self
    }

    fn connection_url(endpoint: &ServerEndpoint) -> String {
        let scheme = if endpoint.use_tls { "rediss" } else { "redis" };
        let userinfo = match &endpoint.credentials {
            Some(c) => format!(
                "{}:{}@",
                c.username.as_deref().unwrap_or(""),
                c.password.as_deref().unwrap_or("")
            ),
            None => String::new(),
        };
        format!(
            "{}://{}{}:{}/{}",
            scheme, userinfo, endpoint.host, endpoint.port, endpoint.database_id
        )
    }
}

impl RedisBackend {
    fn open_client(endpoint: &ServerEndpoint) -> Result<redis::Client, BackendError> {
        redis::Client::open(Self::connection_url(endpoint).as_str())
            .map_err(|e| BackendError::Unsupported(e.to_string()))
    }
}

fn map_error(e: RedisError) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        BackendError::Transport(e.to_string())
    } else if e.kind() == redis::ErrorKind::TypeError {
        BackendError::Protocol(e.to_string())
    } else {
        BackendError::Command(e.to_string())
    }
}

impl Backend for RedisBackend {
    type Connection = RedisConnection;

    fn name(&self) -> &'static str {
        "redis"
    }

    /// The `redis` crate vets the URL (scheme, TLS support, database) when
    /// a client is opened, without touching the network
    fn check(&self, endpoint: &ServerEndpoint) -> Result<(), BackendError> {
        Self::open_client(endpoint).map(|_| ())
    }

    fn connect(
        &self,
        endpoint: &ServerEndpoint,
        options: &ConnectOptions,
    ) -> Result<RedisConnection, BackendError> {
        let client = Self::open_client(endpoint)?;

        let conn = match options.connect_timeout {
            Some(timeout) => client.get_connection_with_timeout(timeout),
            None => client.get_connection(),
        }
        .map_err(map_error)?;

        conn.set_read_timeout(options.socket_timeout)
            .map_err(map_error)?;
        conn.set_write_timeout(options.socket_timeout)
            .map_err(map_error)?;

        tracing::debug!("Connected to {} via redis", endpoint);
        Ok(RedisConnection {
            inner: Some(conn),
            address: endpoint.address(),
        })
    }
}

pub struct RedisConnection {
    inner: Option<redis::Connection>,
    address: String,
}

fn command(name: &str, key: &[u8]) -> Cmd {
    let mut cmd = redis::cmd(name);
    cmd.arg(key);
    cmd
}

fn with_args<'a, I: IntoIterator<Item = &'a Vec<u8>>>(mut cmd: Cmd, args: I) -> Cmd {
    for arg in args {
        cmd.arg(arg.as_slice());
    }
    cmd
}

impl RedisConnection {
    fn query<T: FromRedisValue>(&mut self, cmd: &Cmd) -> Result<T, BackendError> {
        let conn = self
            .inner
            .as_mut()
            .ok_or_else(|| BackendError::Transport(format!("connection to {} closed", self.address)))?;
        cmd.query(conn).map_err(map_error)
    }

    fn int(&mut self, cmd: Cmd) -> Result<Reply, BackendError> {
        self.query::<i64>(&cmd).map(Reply::Int)
    }

    fn ok(&mut self, cmd: Cmd) -> Result<Reply, BackendError> {
        self.query::<()>(&cmd).map(|_| Reply::Ok)
    }

    fn optional_bulk(&mut self, cmd: Cmd) -> Result<Reply, BackendError> {
        self.query::<Option<Vec<u8>>>(&cmd)
            .map(|v| v.map_or(Reply::Nil, Reply::Bulk))
    }

    fn bulk_array(&mut self, cmd: Cmd) -> Result<Reply, BackendError> {
        self.query::<Vec<Vec<u8>>>(&cmd)
            .map(|items| Reply::Array(items.into_iter().map(Reply::Bulk).collect()))
    }

    fn pop(&mut self, name: &str, key: &[u8], count: Option<usize>) -> Result<Reply, BackendError> {
        let mut cmd = command(name, key);
        match count {
            None => self.optional_bulk(cmd),
            Some(n) => {
                cmd.arg(n);
                self.query::<Option<Vec<Vec<u8>>>>(&cmd).map(|items| match items {
                    None => Reply::Nil,
                    Some(items) => Reply::Array(items.into_iter().map(Reply::Bulk).collect()),
                })
            }
        }
    }
}

impl Connection for RedisConnection {
    fn execute(&mut self, command_: &Command) -> Result<Reply, BackendError> {
        tracing::trace!("redis {} <- {}", self.address, command_.name());
        match command_ {
            Command::Ping => self
                .query::<String>(&redis::cmd("PING"))
                .map(|s| Reply::Bulk(s.into_bytes())),
            Command::Get { key } => self.optional_bulk(command("GET", key)),
            Command::Set { key, value, expiry_ms, condition } => {
                let mut cmd = command("SET", key);
                cmd.arg(value.as_slice());
                if let Some(ms) = expiry_ms {
                    cmd.arg("PX").arg(*ms);
                }
                match condition {
                    SetCondition::Always => {}
                    SetCondition::IfAbsent => {
                        cmd.arg("NX");
                    }
                    SetCondition::IfExists => {
                        cmd.arg("XX");
                    }
                }
                let raw = self.query::<redis::Value>(&cmd)?;
                Ok(if matches!(raw, redis::Value::Nil) { Reply::Nil } else { Reply::Ok })
            }
            Command::Del { keys } => self.int(with_args(redis::cmd("DEL"), keys)),
            Command::Exists { key } => self.int(command("EXISTS", key)),
            Command::IncrBy { key, delta } => {
                let mut cmd = command("INCRBY", key);
                cmd.arg(*delta);
                self.int(cmd)
            }
            Command::PExpire { key, ms } => {
                let mut cmd = command("PEXPIRE", key);
                cmd.arg(*ms);
                self.int(cmd)
            }
            Command::PTtl { key } => self.int(command("PTTL", key)),
            Command::Persist { key } => self.int(command("PERSIST", key)),
            Command::MGet { keys } => self
                .query::<Vec<Option<Vec<u8>>>>(&with_args(redis::cmd("MGET"), keys))
                .map(|items| {
                    Reply::Array(
                        items
                            .into_iter()
                            .map(|v| v.map_or(Reply::Nil, Reply::Bulk))
                            .collect(),
                    )
                }),
            Command::MSet { entries, expiry_ms } => {
                let mut pipe = redis::pipe();
                for (key, value) in entries {
                    pipe.cmd("SET").arg(key.as_slice()).arg(value.as_slice());
                    if let Some(ms) = expiry_ms {
                        pipe.arg("PX").arg(*ms);
                    }
                    pipe.ignore();
                }
                let conn = self.inner.as_mut().ok_or_else(|| {
                    BackendError::Transport(format!("connection to {} closed", self.address))
                })?;
                pipe.query::<()>(conn).map_err(map_error)?;
                Ok(Reply::Ok)
            }
            Command::FlushDb => self.ok(redis::cmd("FLUSHDB")),

            Command::LPush { key, values } => self.int(with_args(command("LPUSH", key), values)),
            Command::RPush { key, values } => self.int(with_args(command("RPUSH", key), values)),
            Command::LPop { key, count } => self.pop("LPOP", key, *count),
            Command::RPop { key, count } => self.pop("RPOP", key, *count),
            Command::LLen { key } => self.int(command("LLEN", key)),
            Command::LRange { key, start, stop } => {
                let mut cmd = command("LRANGE", key);
                cmd.arg(*start).arg(*stop);
                self.bulk_array(cmd)
            }
            Command::LIndex { key, index } => {
                let mut cmd = command("LINDEX", key);
                cmd.arg(*index);
                self.optional_bulk(cmd)
            }
            Command::LSet { key, index, value } => {
                let mut cmd = command("LSET", key);
                cmd.arg(*index).arg(value.as_slice());
                self.ok(cmd)
            }
            Command::LRem { key, count, value } => {
                let mut cmd = command("LREM", key);
                cmd.arg(*count).arg(value.as_slice());
                self.int(cmd)
            }
            Command::LTrim { key, start, stop } => {
                let mut cmd = command("LTRIM", key);
                cmd.arg(*start).arg(*stop);
                self.ok(cmd)
            }
            Command::LInsert { key, position, pivot, value } => {
                let mut cmd = command("LINSERT", key);
                cmd.arg(match position {
                    InsertPosition::Before => "BEFORE",
                    InsertPosition::After => "AFTER",
                })
                .arg(pivot.as_slice())
                .arg(value.as_slice());
                self.int(cmd)
            }

            Command::HSet { key, field, value } => {
                let mut cmd = command("HSET", key);
                cmd.arg(field.as_slice()).arg(value.as_slice());
                self.int(cmd)
            }
            Command::HGet { key, field } => {
                let mut cmd = command("HGET", key);
                cmd.arg(field.as_slice());
                self.optional_bulk(cmd)
            }
            Command::HDel { key, fields } => self.int(with_args(command("HDEL", key), fields)),
            Command::HLen { key } => self.int(command("HLEN", key)),
            Command::HKeys { key } => self.bulk_array(command("HKEYS", key)),
            Command::HExists { key, field } => {
                let mut cmd = command("HEXISTS", key);
                cmd.arg(field.as_slice());
                self.int(cmd)
            }
            Command::HGetAll { key } => self.bulk_array(command("HGETALL", key)),

            Command::SAdd { key, members } => self.int(with_args(command("SADD", key), members)),
            Command::SRem { key, members } => self.int(with_args(command("SREM", key), members)),
            Command::SMembers { key } => self.bulk_array(command("SMEMBERS", key)),
            Command::SIsMember { key, member } => {
                let mut cmd = command("SISMEMBER", key);
                cmd.arg(member.as_slice());
                self.int(cmd)
            }
            Command::SCard { key } => self.int(command("SCARD", key)),
            Command::SPop { key } => self.optional_bulk(command("SPOP", key)),

            Command::ZAdd { key, members } => {
                let mut cmd = command("ZADD", key);
                for (score, member) in members {
                    cmd.arg(*score).arg(member.as_slice());
                }
                self.int(cmd)
            }
            Command::ZRem { key, members } => self.int(with_args(command("ZREM", key), members)),
            Command::ZScore { key, member } => {
                let mut cmd = command("ZSCORE", key);
                cmd.arg(member.as_slice());
                self.optional_bulk(cmd)
            }
            Command::ZRange { key, start, stop, with_scores } => {
                let mut cmd = command("ZRANGE", key);
                cmd.arg(*start).arg(*stop);
                if *with_scores {
                    cmd.arg("WITHSCORES");
                }
                self.bulk_array(cmd)
            }
            Command::ZCard { key } => self.int(command("ZCARD", key)),
            Command::ZIncrBy { key, delta, member } => {
                let mut cmd = command("ZINCRBY", key);
                cmd.arg(*delta).arg(member.as_slice());
                self.optional_bulk(cmd)
            }
        }
    }

    fn close(&mut self) -> Result<(), BackendError> {
        // redis::Connection closes its socket on drop
        self.inner.take();
        Ok(())
    }
}
