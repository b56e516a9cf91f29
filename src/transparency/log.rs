//! Tracking and delivery counters.
//!
//! Records how many events were tracked, dropped and delivered, without
//! storing any event content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one batcher instance.
#[derive(Debug)]
pub struct TrackerStats {
    /// Events accepted into the queue
    tracked: AtomicU64,
    /// High-frequency events dropped inside a throttle window
    throttled: AtomicU64,
    /// Key events dropped because the key is not allow-listed
    filtered: AtomicU64,
    /// Events evicted because the queue was at capacity
    evicted: AtomicU64,
    /// Events the activity API accepted
    delivered: AtomicU64,
    /// Events whose delivery failed and were dropped
    failed: AtomicU64,
    /// Flushes that sent at least one event
    flushes: AtomicU64,
    started_at: DateTime<Utc>,
}

impl TrackerStats {
    pub fn new() -> Self {
        Self {
            tracked: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_tracked(&self) {
        self.tracked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tracked: self.tracked.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Tracking Statistics:\n\
             - Events tracked: {}\n\
             - Dropped by throttling: {}\n\
             - Keys filtered: {}\n\
             - Evicted at capacity: {}\n\
             - Events delivered: {}\n\
             - Delivery failures: {}\n\
             - Flushes: {}\n\
             - Uptime: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No character keys captured\n\
             - Delivery is best-effort; failed events are not retried",
            stats.tracked,
            stats.throttled,
            stats.filtered,
            stats.evicted,
            stats.delivered,
            stats.failed,
            stats.flushes,
            stats.uptime_secs
        )
    }
}

impl Default for TrackerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub tracked: u64,
    pub throttled: u64,
    pub filtered: u64,
    pub evicted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub flushes: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared stats.
pub type SharedTrackerStats = Arc<TrackerStats>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = TrackerStats::new();

        stats.record_tracked();
        stats.record_tracked();
        stats.record_throttled();
        stats.record_delivered();
        stats.record_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.tracked, 2);
        assert_eq!(snapshot.throttled, 1);
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.filtered, 0);
    }

    #[test]
    fn test_summary_format() {
        let stats = TrackerStats::new();
        let summary = stats.summary();

        assert!(summary.contains("Events tracked"));
        assert!(summary.contains("Delivery failures"));
        assert!(summary.contains("Privacy Guarantee"));
        assert!(summary.contains("No character keys captured"));
    }
}
