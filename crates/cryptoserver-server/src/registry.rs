//! Connection registry for in-flight request tracking.
//!
//! The registry maps a request identifier to a [`ConnectionRecord`] describing
//! the request being served. Every operation (add, update, close, list) runs
//! under one mutex that is held only for the map manipulation itself, never
//! across I/O or cipher work.
//!
//! Request handlers normally go through [`ConnectionRegistry::open`], which
//! allocates an identifier, adds the record and returns a [`ConnectionGuard`]
//! that closes it when dropped. This keeps records from outliving their
//! request on every exit path, including early returns and panics.
//!
//! Identifier `0` is reserved: operations presenting it are no-ops.

use std::{
    collections::BTreeMap,
    net::{IpAddr, SocketAddr},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::NaiveDateTime;
use cryptoserver_core::Environment;
use serde::Serialize;

/// Descriptor of one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionRecord {
    /// Request identifier (unique among open records)
    pub request_id: u64,
    /// Peer address
    pub source_ip: IpAddr,
    /// Peer port
    pub source_port: u16,
    /// HTTP method
    pub method: String,
    /// Request path without query string
    pub raw_url: String,
    /// Configured DNS hostname of this node
    pub host_name: Option<String>,
    /// `Host` header supplied by the client
    pub http_host_name: Option<String>,
    /// Configured node name
    pub node_name: Option<String>,
    /// Local time the record was added
    pub start_time: NaiveDateTime,
    /// Local time of the last update
    pub end_time: NaiveDateTime,
}

/// Thread-safe table of in-flight requests.
#[derive(Debug)]
pub struct ConnectionRegistry<E: Environment> {
    env: E,
    /// Request ID → record
    records: Mutex<BTreeMap<u64, ConnectionRecord>>,
    /// Next request ID to hand out; starts at 1
    next_id: AtomicU64,
}

impl<E: Environment> ConnectionRegistry<E> {
    /// Create a new empty registry.
    pub fn new(env: E) -> Self {
        Self { env, records: Mutex::new(BTreeMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Allocate a fresh, non-zero request identifier.
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate an identifier, add a record for it and return a guard that
    /// closes the record on drop.
    pub fn open(
        self: &Arc<Self>,
        source: SocketAddr,
        method: &str,
        path: &str,
    ) -> ConnectionGuard<E> {
        let request_id = self.next_request_id();
        self.add(request_id, source, method, path);
        ConnectionGuard { registry: Arc::clone(self), request_id }
    }

    /// Insert a record for `request_id` stamped with the current local time.
    ///
    /// Returns `false` (and does nothing) if `request_id` is 0. An existing
    /// record with the same identifier is replaced, so there is never more
    /// than one record per identifier.
    pub fn add(&self, request_id: u64, source: SocketAddr, method: &str, path: &str) -> bool {
        if request_id == 0 {
            return false;
        }

        let now = self.env.local_time();
        let record = ConnectionRecord {
            request_id,
            source_ip: source.ip(),
            source_port: source.port(),
            method: method.to_string(),
            raw_url: path.to_string(),
            host_name: None,
            http_host_name: None,
            node_name: None,
            start_time: now,
            end_time: now,
        };

        if self.lock().insert(request_id, record).is_some() {
            tracing::warn!("Add replaced existing connection for request ID {}", request_id);
        }
        true
    }

    /// Set the routing context of an open record.
    ///
    /// Returns `false` and logs a warning if no record exists for
    /// `request_id`.
    pub fn update(
        &self,
        request_id: u64,
        host_name: &str,
        http_host_name: &str,
        node_name: &str,
    ) -> bool {
        if request_id == 0 {
            return false;
        }

        let now = self.env.local_time();
        let updated = match self.lock().get_mut(&request_id) {
            Some(record) => {
                record.host_name = Some(host_name.to_string());
                record.http_host_name = Some(http_host_name.to_string());
                record.node_name = Some(node_name.to_string());
                record.end_time = now;
                true
            },
            None => false,
        };

        if !updated {
            tracing::warn!("Update unable to find connection for request ID {}", request_id);
        }
        updated
    }

    /// Remove the record for `request_id`, returning it if it existed.
    pub fn close(&self, request_id: u64) -> Option<ConnectionRecord> {
        if request_id == 0 {
            return None;
        }
        self.lock().remove(&request_id)
    }

    /// Snapshot of all open records, ordered by request ID.
    ///
    /// The copy is taken under the lock, so it reflects a single point in
    /// time; the caller iterates it without holding any lock.
    pub fn list(&self) -> Vec<ConnectionRecord> {
        self.lock().values().cloned().collect()
    }

    /// Number of open records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no records are open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquire the table.
    ///
    /// Every operation leaves the map consistent before it can panic, so a
    /// poisoned lock is safe to recover.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, ConnectionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Open registry record owned by one request. Closes the record on drop.
#[derive(Debug)]
pub struct ConnectionGuard<E: Environment> {
    registry: Arc<ConnectionRegistry<E>>,
    request_id: u64,
}

impl<E: Environment> ConnectionGuard<E> {
    /// Identifier of the guarded record.
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Set the routing context of the guarded record.
    pub fn update(&self, host_name: &str, http_host_name: &str, node_name: &str) -> bool {
        self.registry.update(self.request_id, host_name, http_host_name, node_name)
    }
}

impl<E: Environment> Drop for ConnectionGuard<E> {
    fn drop(&mut self) {
        self.registry.close(self.request_id);
    }
}
