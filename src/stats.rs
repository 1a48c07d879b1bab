//! Per-vendor and dispatcher-wide usage statistics.
//!
//! All counters live behind a single [`parking_lot::RwLock`], mirroring the
//! teacher's `MetricsCollector` (one consolidated lock per aggregator rather
//! than one lock per field) to keep contention and code both low.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// Running counters for a single vendor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    /// Running average latency in milliseconds: `(old + new) / 2` once a
    /// prior sample exists, else the first sample verbatim. This is a
    /// simple exponential-style smoother, not a true arithmetic mean —
    /// reproduced exactly so recency-weighted test expectations hold.
    pub average_latency_ms: f64,
    pub total_cost: f64,
    pub average_cost: f64,
    pub last_used: Option<DateTime<Utc>>,
}

/// Running counters for a single mode (spec §3: `DispatcherStats` carries a
/// "per-mode map" alongside its per-vendor one). Kept deliberately smaller
/// than [`VendorStats`] — the spec names no mode-level latency or cost
/// rule, only that requests dispatched under a mode are counted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
}

/// A point-in-time snapshot of every vendor's [`VendorStats`] plus
/// dispatcher-wide totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatcherStats {
    pub vendors: HashMap<String, VendorStats>,
    pub modes: HashMap<String, ModeStats>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_cost: f64,
    pub average_cost: f64,
    /// Global running average latency, updated by the same `(old + new) / 2`
    /// rule as each vendor's.
    pub average_latency_ms: f64,
    pub last_request_time: Option<DateTime<Utc>>,
}

fn running_average(old: f64, sample: f64) -> f64 {
    if old == 0.0 {
        sample
    } else {
        (old + sample) / 2.0
    }
}

/// Thread-safe accumulator the dispatcher updates after every call.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: RwLock<DispatcherStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one request. `vendor` is empty when the
    /// dispatch failed before a vendor was ever selected, in which case only
    /// the dispatcher-wide counters (and, if known, the per-mode counters)
    /// are updated. `mode` is empty when the dispatch bypassed mode
    /// selection entirely (`send_to_vendor` / `send_streaming_to_vendor`).
    pub fn update_stats(&self, success: bool, vendor: &str, mode: &str, latency: Duration, cost: f64) {
        let mut stats = self.inner.write();
        let now = Utc::now();

        stats.total_requests += 1;
        stats.last_request_time = Some(now);
        if success {
            stats.successful_requests += 1;
        } else {
            stats.failed_requests += 1;
        }

        stats.total_cost += cost;
        stats.average_cost = stats.total_cost / stats.total_requests.max(1) as f64;

        let sample_ms = latency.as_secs_f64() * 1000.0;
        stats.average_latency_ms = running_average(stats.average_latency_ms, sample_ms);

        if !vendor.is_empty() {
            let entry = stats.vendors.entry(vendor.to_string()).or_default();
            entry.requests += 1;
            if success {
                entry.successes += 1;
            } else {
                entry.failures += 1;
            }
            entry.average_latency_ms = running_average(entry.average_latency_ms, sample_ms);
            entry.total_cost += cost;
            entry.average_cost = entry.total_cost / entry.requests as f64;
            entry.last_used = Some(now);
        }

        if !mode.is_empty() {
            let entry = stats.modes.entry(mode.to_string()).or_default();
            entry.requests += 1;
            if success {
                entry.successes += 1;
            } else {
                entry.failures += 1;
            }
        }
    }

    /// Returns a deep copy of the current statistics. Safe to hold onto after
    /// the lock is released since it owns everything it contains.
    pub fn snapshot(&self) -> DispatcherStats {
        self.inner.read().clone()
    }

    /// Statistics for a single vendor, if any requests have been recorded for it.
    pub fn vendor_snapshot(&self, vendor: &str) -> Option<VendorStats> {
        self.inner.read().vendors.get(vendor).cloned()
    }

    /// Statistics for a single mode, if any requests have been recorded under it.
    pub fn mode_snapshot(&self, mode: &str) -> Option<ModeStats> {
        self.inner.read().modes.get(mode).cloned()
    }
}
