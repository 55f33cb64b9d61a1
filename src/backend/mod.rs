//! Backend Module
//!
//! The collaborator boundary: everything the client needs from a wire client
//! library is `check`, `connect`, `close` and the [`Command`] surface. Each
//! supported client library gets one conforming implementation; the client
//! core only ever sees these traits. Byte-level protocol handling stays inside
//! the client library.
//!
//! ## Implementations
//! - [`MemoryBackend`]: in-process engines, one per (address, database)
//! - `RedisBackend`: the `redis` crate (feature `redis`)

mod memory;

#[cfg(feature = "redis")]
mod redis;

use std::time::Duration;

use crate::config::ClientConfig;
use crate::endpoint::ServerEndpoint;
use crate::error::BackendError;
use crate::protocol::{Command, Reply};

pub use memory::{MemoryBackend, MemoryConnection};

#[cfg(feature = "redis")]
pub use self::redis::{RedisBackend, RedisConnection};

/// Per-connection deadlines and limits
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub connect_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    /// Upper bound on sockets per endpoint. The pool never opens more than
    /// one, so this only caps backends that pool internally.
    pub max_connections: usize,
}

impl ConnectOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            socket_timeout: config.socket_timeout(),
            max_connections: config.max_connections,
        }
    }
}

/// An open session with one endpoint
pub trait Connection: Send {
    /// Run one command. Semantic rejections come back as
    /// [`BackendError::Command`]; anything else means the session is suspect.
    fn execute(&mut self, command: &Command) -> Result<Reply, BackendError>;

    /// Close the session. Must tolerate being called more than once.
    fn close(&mut self) -> Result<(), BackendError>;
}

/// A backend client library
pub trait Backend: Send + Sync {
    type Connection: Connection;

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Reject endpoints this backend can never serve (e.g. TLS on a
    /// plaintext-only client). Runs once per endpoint when the client is
    /// built, before any I/O.
    fn check(&self, _endpoint: &ServerEndpoint) -> Result<(), BackendError> {
        Ok(())
    }

    fn connect(
        &self,
        endpoint: &ServerEndpoint,
        options: &ConnectOptions,
    ) -> Result<Self::Connection, BackendError>;
}
