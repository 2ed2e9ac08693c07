use crate::config::AppConfig;
use crate::db::DbPool;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub greeks_computed: AtomicU64,
    pub positions_enriched: AtomicU64,
    pub positions_written: AtomicU64,
    pub invalid_requests: AtomicU64,
    pub errors_recovered: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            greeks_computed: AtomicU64::new(0),
            positions_enriched: AtomicU64::new(0),
            positions_written: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            errors_recovered: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            greeks_computed: self.greeks_computed.load(Ordering::Relaxed),
            positions_enriched: self.positions_enriched.load(Ordering::Relaxed),
            positions_written: self.positions_written.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            errors_recovered: self.errors_recovered.load(Ordering::Relaxed),
        }
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub greeks_computed: u64,
    pub positions_enriched: u64,
    pub positions_written: u64,
    pub invalid_requests: u64,
    pub errors_recovered: u64,
}

// ── Application shared state ──

/// Handlers share this via `Arc`. No credentials or caches live here;
/// request-scoped data travels with the request.
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Arc<Self> {
        Arc::new(Self {
            config,
            db,
            counters: PerfCounters::new(),
        })
    }
}
