//! Connection Factory
//!
//! Owns at most one backend connection per configured endpoint.
//!
//! ## Concurrency
//! Each endpoint slot sits behind its own mutex. The first caller to find a
//! slot empty opens the connection while holding the slot lock, so racing
//! callers never open two connections for one endpoint. Calls against
//! different endpoints never contend.
//!
//! ## Lifecycle
//! - Lazy: nothing is opened until an endpoint is first used
//! - A connectivity-class failure drops the slot's connection; the next
//!   call reconnects
//! - `close_all` is idempotent and never fails; it also runs on drop

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::backend::{Backend, ConnectOptions, Connection};
use crate::endpoint::ServerEndpoint;
use crate::error::BackendError;
use crate::protocol::{Command, Reply};

type Slot<C> = Mutex<Option<C>>;

/// Per-endpoint connection cache with a defined lifetime
pub struct ConnectionPool<B: Backend> {
    backend: B,
    endpoints: Vec<ServerEndpoint>,
    slots: Vec<Slot<B::Connection>>,
    options: ConnectOptions,
    closed: AtomicBool,
}

impl<B: Backend> ConnectionPool<B> {
    pub fn new(backend: B, endpoints: Vec<ServerEndpoint>, options: ConnectOptions) -> Self {
        let slots = endpoints.iter().map(|_| Mutex::new(None)).collect();
        Self {
            backend,
            endpoints,
            slots,
            options,
            closed: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn endpoints(&self) -> &[ServerEndpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// `host:port` of endpoint `index`, for error reports
    pub fn address(&self, index: usize) -> String {
        self.endpoints
            .get(index)
            .map(ServerEndpoint::address)
            .unwrap_or_else(|| format!("#{}", index))
    }

    /// True if endpoint `index` currently holds an open connection
    pub fn is_connected(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .map(|slot| slot.lock().is_some())
            .unwrap_or(false)
    }

    fn slot(&self, index: usize) -> Result<&Slot<B::Connection>, BackendError> {
        self.slots.get(index).ok_or_else(|| {
            BackendError::Unsupported(format!(
                "endpoint index {} out of {} configured",
                index,
                self.slots.len()
            ))
        })
    }

    fn fill<'a>(
        &'a self,
        index: usize,
        mut guard: MutexGuard<'a, Option<B::Connection>>,
    ) -> Result<MutexGuard<'a, Option<B::Connection>>, BackendError> {
        if guard.is_none() {
            let endpoint = &self.endpoints[index];
            tracing::debug!("Opening {} connection to {}", self.backend.name(), endpoint);
            let connection = self.backend.connect(endpoint, &self.options).map_err(|e| {
                tracing::warn!("Failed to connect to {}: {}", endpoint, e);
                e
            })?;
            *guard = Some(connection);
            self.closed.store(false, Ordering::SeqCst);
        }
        Ok(guard)
    }

    /// Borrow the connection for endpoint `index`, opening it if needed
    ///
    /// The endpoint stays locked while the guard lives; never hold it across
    /// two logical operations.
    pub fn acquire(
        &self,
        index: usize,
    ) -> Result<MappedMutexGuard<'_, B::Connection>, BackendError> {
        let guard = self.fill(index, self.slot(index)?.lock())?;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
            BackendError::Transport(format!("no connection to {}", self.address(index)))
        })
    }

    /// Run one command on endpoint `index`
    ///
    /// A connectivity-class failure discards the connection so the next
    /// call starts from a fresh one.
    pub fn execute(&self, index: usize, command: &Command) -> Result<Reply, BackendError> {
        let mut guard = self.fill(index, self.slot(index)?.lock())?;
        let result = match guard.as_mut() {
            Some(connection) => connection.execute(command),
            None => Err(BackendError::Transport(format!(
                "no connection to {}",
                self.address(index)
            ))),
        };

        if let Err(e) = &result {
            if e.is_connectivity() {
                if let Some(mut broken) = guard.take() {
                    tracing::debug!("Dropping connection to {} after: {}", self.address(index), e);
                    let _ = broken.close();
                }
            }
        }
        result
    }

    /// Close and forget the connection for endpoint `index`
    pub fn release(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            if let Some(mut connection) = slot.lock().take() {
                self.close_quietly(index, &mut connection);
            }
        }
    }

    /// Close every open connection. Errors are logged, never returned.
    pub fn close_all(&self) {
        for index in 0..self.slots.len() {
            self.release(index);
        }
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Connection pool closed ({} endpoint(s))", self.slots.len());
        }
    }

    fn close_quietly(&self, index: usize, connection: &mut B::Connection) {
        match connection.close() {
            Ok(()) => tracing::debug!("Closed connection to {}", self.address(index)),
            Err(e) => tracing::warn!(
                "Error closing connection to {} (ignored): {}",
                self.address(index),
                e
            ),
        }
    }
}

impl<B: Backend> Drop for ConnectionPool<B> {
    fn drop(&mut self) {
        self.close_all();
    }
}
