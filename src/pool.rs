//! Connection Pool
//!
//! Caches XML-RPC proxy handles per endpoint URL so logical connections
//! sharing a pool reuse them. Entries go stale after an idle timeout and
//! the pool never holds more than `max_connections` handles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::error::{OdooError, Result};
use crate::rpc::{RpcProxy, Transport};

// == Pool Config ==
/// Pool sizing and staleness policy.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pooled handles
    pub max_connections: usize,
    /// A handle unused for longer than this is stale
    pub idle_timeout: Duration,
    /// Minimum delay between two housekeeping sweeps
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

// == Pool Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub connections_created: u64,
    pub connections_reused: u64,
    pub connections_closed: u64,
    pub active_connections: usize,
}

struct PoolEntry {
    proxy: Arc<dyn RpcProxy>,
    last_used: Instant,
}

struct PoolInner {
    entries: HashMap<String, PoolEntry>,
    last_sweep: Instant,
    stats: PoolStats,
}

impl PoolInner {
    fn close(&mut self, endpoint: &str) {
        if self.entries.remove(endpoint).is_some() {
            self.stats.connections_closed += 1;
            self.stats.active_connections = self.entries.len();
        }
    }

    fn sweep(&mut self, now: Instant, idle_timeout: Duration) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_used) < idle_timeout);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.stats.connections_closed += removed as u64;
            self.stats.active_connections = self.entries.len();
            debug!(removed, "cleaned up stale connections");
        }
        self.last_sweep = now;
    }

    fn oldest(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(endpoint, _)| endpoint.clone())
    }
}

// == Connection Pool ==
/// Thread-safe pool of proxy handles keyed by endpoint URL.
pub struct ConnectionPool {
    transport: Arc<dyn Transport>,
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

impl ConnectionPool {
    pub fn new(transport: Arc<dyn Transport>, config: PoolConfig) -> Self {
        let config = PoolConfig {
            max_connections: config.max_connections.max(1),
            ..config
        };
        Self {
            transport,
            config,
            inner: Mutex::new(PoolInner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
                stats: PoolStats::default(),
            }),
        }
    }

    /// Returns the pooled handle for `endpoint`, creating one if needed.
    ///
    /// A handle used within the idle timeout is reused as-is; a stale one
    /// is closed and replaced. At capacity the least recently used handle
    /// is closed to make room. Housekeeping of every stale handle runs at
    /// most once per sweep interval, piggybacking on this call.
    pub fn get_connection(&self, endpoint: &str) -> Result<Arc<dyn RpcProxy>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if now.duration_since(inner.last_sweep) > self.config.sweep_interval {
            inner.sweep(now, self.config.idle_timeout);
        }

        if let Some(entry) = inner.entries.get_mut(endpoint) {
            if now.duration_since(entry.last_used) < self.config.idle_timeout {
                entry.last_used = now;
                let proxy = Arc::clone(&entry.proxy);
                inner.stats.connections_reused += 1;
                debug!(endpoint, "reusing connection");
                return Ok(proxy);
            }
            inner.close(endpoint);
        }

        if inner.entries.len() >= self.config.max_connections {
            if let Some(oldest) = inner.oldest() {
                inner.close(&oldest);
            }
        }

        let proxy = self.transport.open(endpoint).map_err(|e| {
            OdooError::connection(format!("Failed to open connection to {}: {}", endpoint, e))
        })?;
        inner.entries.insert(
            endpoint.to_string(),
            PoolEntry {
                proxy: Arc::clone(&proxy),
                last_used: now,
            },
        );
        inner.stats.connections_created += 1;
        inner.stats.active_connections = inner.entries.len();
        debug!(endpoint, "created new connection");
        Ok(proxy)
    }

    /// Closes every pooled handle.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.stats.connections_closed += inner.entries.len() as u64;
        inner.entries.clear();
        inner.stats.active_connections = 0;
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Transport the pool opens handles with.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
