//! Performance Manager
//!
//! Owns the three caches, the connection pool and the operation monitor
//! shared by every connection built on top of it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{Cache, CacheKey, CacheSnapshot};
use crate::config::Config;
use crate::error::{OdooError, Result};
use crate::pool::{ConnectionPool, PoolConfig, PoolStats};
use crate::rpc::{HttpTransport, RpcProxy, Transport};

/// Field metadata rarely changes.
pub const FIELD_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const PERMISSION_CACHE_TTL: Duration = Duration::from_secs(300);

const FIELD_CACHE_MB: usize = 10;
const RECORD_CACHE_MB: usize = 50;
const PERMISSION_CACHE_MB: usize = 5;

/// Durations kept per operation name.
const MAX_SAMPLES: usize = 1000;

// == Monitor ==
/// Rolling duration samples per operation name.
#[derive(Debug)]
pub struct PerformanceMonitor {
    samples: Mutex<HashMap<String, VecDeque<Duration>>>,
    started_at: DateTime<Utc>,
}

/// Aggregates over the retained samples of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationStats {
    pub count: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub operations: BTreeMap<String, OperationStats>,
}

/// Records the elapsed time under its operation name when dropped, so an
/// operation that fails is measured too.
pub struct OperationTimer<'a> {
    monitor: &'a PerformanceMonitor,
    operation: String,
    started: Instant,
}

impl Drop for OperationTimer<'_> {
    fn drop(&mut self) {
        self.monitor
            .record(&self.operation, self.started.elapsed());
    }
}

fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 100_000.0).round() / 100.0
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            started_at: Utc::now(),
        }
    }

    /// Starts timing `operation`; the sample is taken when the guard drops.
    pub fn track(&self, operation: impl Into<String>) -> OperationTimer<'_> {
        OperationTimer {
            monitor: self,
            operation: operation.into(),
            started: Instant::now(),
        }
    }

    pub fn record(&self, operation: &str, duration: Duration) {
        let mut samples = self.samples.lock();
        let window = samples.entry(operation.to_string()).or_default();
        window.push_back(duration);
        if window.len() > MAX_SAMPLES {
            window.pop_front();
        }
    }

    pub fn stats(&self) -> MonitorStats {
        let samples = self.samples.lock();
        let operations = samples
            .iter()
            .filter_map(|(name, window)| {
                let last = *window.back()?;
                let total: Duration = window.iter().sum();
                let min = window.iter().min().copied().unwrap_or_default();
                let max = window.iter().max().copied().unwrap_or_default();
                Some((
                    name.clone(),
                    OperationStats {
                        count: window.len(),
                        avg_ms: millis(total / window.len() as u32),
                        min_ms: millis(min),
                        max_ms: millis(max),
                        last_ms: millis(last),
                    },
                ))
            })
            .collect();

        MonitorStats {
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            operations,
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// == Manager ==
/// Serializable report of every cache, the pool and the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub caches: CachesStats,
    pub connection_pool: PoolStats,
    pub performance: MonitorStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachesStats {
    pub field_cache: CacheSnapshot,
    pub record_cache: CacheSnapshot,
    pub permission_cache: CacheSnapshot,
}

/// Shared caches, pool and monitor.
///
/// Several connections may share one manager through `Arc`; it is the
/// only state intentionally shared between them.
pub struct PerformanceManager {
    field_cache: Cache<CacheKey, Value>,
    record_cache: Cache<CacheKey, Value>,
    permission_cache: Cache<CacheKey, Value>,
    pool: ConnectionPool,
    monitor: PerformanceMonitor,
    record_ttl: Duration,
}

impl PerformanceManager {
    /// Builds a manager whose pool opens handles through `transport`.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let pool = ConnectionPool::new(
            transport,
            PoolConfig {
                max_connections: config.max_connections,
                ..PoolConfig::default()
            },
        );

        info!(
            field_cache = config.field_cache_size,
            record_cache = config.record_cache_size,
            permission_cache = config.permission_cache_size,
            max_connections = config.max_connections,
            "performance manager initialized"
        );

        Self {
            field_cache: Cache::with_memory_mb(config.field_cache_size, FIELD_CACHE_MB),
            record_cache: Cache::with_memory_mb(config.record_cache_size, RECORD_CACHE_MB),
            permission_cache: Cache::with_memory_mb(
                config.permission_cache_size,
                PERMISSION_CACHE_MB,
            ),
            pool,
            monitor: PerformanceMonitor::new(),
            record_ttl: Duration::from_secs(config.record_cache_ttl),
        }
    }

    /// Builds a manager on the HTTP transport, bounded by the configured
    /// timeout.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout()).map_err(|e| {
            OdooError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn field_cache(&self) -> &Cache<CacheKey, Value> {
        &self.field_cache
    }

    pub fn record_cache(&self) -> &Cache<CacheKey, Value> {
        &self.record_cache
    }

    pub fn permission_cache(&self) -> &Cache<CacheKey, Value> {
        &self.permission_cache
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        self.pool.transport()
    }

    // == Fields ==
    pub fn cached_fields(&self, model: &str) -> Option<Value> {
        self.field_cache.get(&CacheKey::fields(model))
    }

    pub fn cache_fields(&self, model: &str, fields: Value) {
        self.field_cache
            .put(CacheKey::fields(model), fields, FIELD_CACHE_TTL);
    }

    // == Records ==
    pub fn cached_record(&self, model: &str, id: i64, fields: Option<&[String]>) -> Option<Value> {
        self.record_cache.get(&CacheKey::record(model, id, fields))
    }

    /// Caches one record under its own `id` field. Returns false when the
    /// record carries no integer id.
    pub fn cache_record(&self, model: &str, record: &Value, fields: Option<&[String]>) -> bool {
        let Some(id) = record.get("id").and_then(Value::as_i64) else {
            return false;
        };
        self.record_cache.put(
            CacheKey::record(model, id, fields),
            record.clone(),
            self.record_ttl,
        );
        true
    }

    /// Drops cached records of `model`, every field selection included.
    /// `None` drops the whole model.
    pub fn invalidate_records(&self, model: &str, ids: Option<&[i64]>) -> usize {
        let removed = match ids {
            None => self
                .record_cache
                .invalidate_where(|key| key.is_record_of(model, None)),
            Some(ids) => self.record_cache.invalidate_where(|key| {
                ids.iter().any(|id| key.is_record_of(model, Some(*id)))
            }),
        };
        if removed > 0 {
            debug!(model, removed, "invalidated cached records");
        }
        removed
    }

    // == Connections ==
    /// Pooled proxy for an absolute endpoint URL.
    pub fn connection(&self, url: &str) -> Result<Arc<dyn RpcProxy>> {
        let _timer = self.monitor.track("connection_get");
        self.pool.get_connection(url)
    }

    pub fn stats(&self) -> PerformanceStats {
        PerformanceStats {
            caches: CachesStats {
                field_cache: self.field_cache.stats(),
                record_cache: self.record_cache.stats(),
                permission_cache: self.permission_cache.stats(),
            },
            connection_pool: self.pool.stats(),
            performance: self.monitor.stats(),
        }
    }

    pub fn clear_all_caches(&self) {
        self.field_cache.clear();
        self.record_cache.clear();
        self.permission_cache.clear();
        info!("cleared all caches");
    }

    pub fn record_ttl(&self) -> Duration {
        self.record_ttl
    }
}
