//! In-process backend
//!
//! Every distinct `host:port` is a simulated server holding one [`Engine`] per
//! database. Clones of a [`MemoryBackend`] share the same servers, which lets
//! tests keep a handle for failure injection and round-trip accounting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::endpoint::ServerEndpoint;
use crate::engine::Engine;
use crate::error::BackendError;
use crate::protocol::{Command, Reply};

use super::{Backend, ConnectOptions, Connection};

#[derive(Debug, Default)]
struct MemoryServer {
    databases: Mutex<HashMap<u32, Arc<Engine>>>,
    down: AtomicBool,
    timeouts_pending: AtomicU64,
    close_fails: AtomicBool,
    round_trips: AtomicU64,
    connections_opened: AtomicU64,
}

impl MemoryServer {
    fn database(&self, db: u32) -> Arc<Engine> {
        Arc::clone(self.databases.lock().entry(db).or_default())
    }

    /// Fails the current round trip if a failure has been injected
    fn check_reachable(&self, address: &str) -> Result<(), BackendError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(format!(
                "connection refused by {}",
                address
            )));
        }
        let took_timeout = self
            .timeouts_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took_timeout {
            return Err(BackendError::Timeout(format!("{} did not answer in time", address)));
        }
        Ok(())
    }
}

/// Backend whose servers live in this process
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    servers: Arc<Mutex<HashMap<String, Arc<MemoryServer>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn server(&self, address: &str) -> Arc<MemoryServer> {
        Arc::clone(self.servers.lock().entry(address.to_string()).or_default())
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// Refuse every connect and command to `address` until restored
    pub fn fail_endpoint(&self, address: &str) {
        self.server(address).down.store(true, Ordering::SeqCst);
    }

    pub fn restore_endpoint(&self, address: &str) {
        let server = self.server(address);
        server.down.store(false, Ordering::SeqCst);
        server.timeouts_pending.store(0, Ordering::SeqCst);
    }

    /// Time out the next `count` round trips to `address`
    pub fn time_out_next(&self, address: &str, count: u64) {
        self.server(address)
            .timeouts_pending
            .store(count, Ordering::SeqCst);
    }

    /// Make `close` on connections to `address` report an error
    pub fn fail_close(&self, address: &str) {
        self.server(address).close_fails.store(true, Ordering::SeqCst);
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Commands that reached `address` (including failed ones)
    pub fn round_trips(&self, address: &str) -> u64 {
        self.server(address).round_trips.load(Ordering::SeqCst)
    }

    pub fn connections_opened(&self, address: &str) -> u64 {
        self.server(address)
            .connections_opened
            .load(Ordering::SeqCst)
    }

    /// Live keys stored on one database of `address`
    pub fn key_count(&self, address: &str, db: u32) -> usize {
        self.server(address).database(db).key_count()
    }
}

impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn connect(
        &self,
        endpoint: &ServerEndpoint,
        _options: &ConnectOptions,
    ) -> Result<MemoryConnection, BackendError> {
        let address = endpoint.address();
        let server = self.server(&address);
        server.check_reachable(&address)?;
        server.connections_opened.fetch_add(1, Ordering::SeqCst);

        let engine = server.database(endpoint.database_id);
        Ok(MemoryConnection {
            server,
            engine,
            address,
            open: true,
        })
    }
}

/// Session with a simulated server
#[derive(Debug)]
pub struct MemoryConnection {
    server: Arc<MemoryServer>,
    engine: Arc<Engine>,
    address: String,
    open: bool,
}

impl Connection for MemoryConnection {
    fn execute(&mut self, command: &Command) -> Result<Reply, BackendError> {
        if !self.open {
            return Err(BackendError::Transport("connection closed".to_string()));
        }
        self.server.round_trips.fetch_add(1, Ordering::SeqCst);
        self.server.check_reachable(&self.address)?;

        tracing::trace!("memory {} <- {}", self.address, command.name());
        self.engine.execute(command)
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.open = false;
        if self.server.close_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(format!(
                "error closing connection to {}",
                self.address
            )));
        }
        Ok(())
    }
}
