//! Counters for cache behavior.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache metrics.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Refreshes started (joined callers are not counted).
    pub refreshes_started: AtomicU64,
    /// Refreshes that stored fresh rates.
    pub refreshes_succeeded: AtomicU64,
    /// Refreshes that returned an error.
    pub refreshes_failed: AtomicU64,
    /// Offline refreshes answered from cache.
    pub offline_fallbacks: AtomicU64,
    /// Callers that joined an in-flight refresh.
    pub coalesced_joins: AtomicU64,
    /// Calls made to the remote source.
    pub remote_calls: AtomicU64,
    /// Historical windows served from cache without a fetch.
    pub history_cache_hits: AtomicU64,
    /// Historical windows fetched remotely.
    pub history_fetches: AtomicU64,
    /// Historical windows answered with a partial cache after a failure.
    pub history_fallbacks: AtomicU64,
    /// Historical rows skipped because they could not be parsed.
    pub history_rows_skipped: AtomicU64,
}

impl CacheMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            refreshes_started: self.refreshes_started.load(Ordering::Relaxed),
            refreshes_succeeded: self.refreshes_succeeded.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            offline_fallbacks: self.offline_fallbacks.load(Ordering::Relaxed),
            coalesced_joins: self.coalesced_joins.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            history_cache_hits: self.history_cache_hits.load(Ordering::Relaxed),
            history_fetches: self.history_fetches.load(Ordering::Relaxed),
            history_fallbacks: self.history_fallbacks.load(Ordering::Relaxed),
            history_rows_skipped: self.history_rows_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub refreshes_started: u64,
    pub refreshes_succeeded: u64,
    pub refreshes_failed: u64,
    pub offline_fallbacks: u64,
    pub coalesced_joins: u64,
    pub remote_calls: u64,
    pub history_cache_hits: u64,
    pub history_fetches: u64,
    pub history_fallbacks: u64,
    pub history_rows_skipped: u64,
}
