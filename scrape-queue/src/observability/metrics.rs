use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use scrape_core::ScrapeTarget;
use serde::Serialize;

/// Per-target counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetMetrics {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub records: u64,
}

/// Point-in-time copy of [`LiveMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_dispatched: u64,
    pub dispatch_failures: u64,
    pub jobs_started: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub deliveries_dropped: u64,
    pub records_persisted: u64,
    pub per_target: BTreeMap<ScrapeTarget, TargetMetrics>,
}

impl MetricsSnapshot {
    /// Share of finished scrapes that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let finished = (self.jobs_completed + self.jobs_failed) as f64;
        if finished == 0.0 {
            100.0
        } else {
            self.jobs_completed as f64 / finished * 100.0
        }
    }
}

/// Live counters for dispatch and worker activity
#[derive(Default)]
pub struct LiveMetrics {
    jobs_dispatched: AtomicU64,
    dispatch_failures: AtomicU64,
    jobs_started: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    deliveries_dropped: AtomicU64,
    records_persisted: AtomicU64,

    per_target: RwLock<BTreeMap<ScrapeTarget, TargetMetrics>>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_dispatched(&self) {
        self.jobs_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dispatch_failures(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_started(&self, target: ScrapeTarget) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
        self.per_target.write().entry(target).or_default().started += 1;
    }

    pub fn increment_completed(&self, target: ScrapeTarget, records: usize) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.records_persisted.fetch_add(records as u64, Ordering::Relaxed);
        let mut per_target = self.per_target.write();
        let entry = per_target.entry(target).or_default();
        entry.completed += 1;
        entry.records += records as u64;
    }

    pub fn increment_failed(&self, target: ScrapeTarget) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        self.per_target.write().entry(target).or_default().failed += 1;
    }

    pub fn increment_dropped(&self) {
        self.deliveries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn jobs_dispatched(&self) -> u64 {
        self.jobs_dispatched.load(Ordering::Relaxed)
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    pub fn deliveries_dropped(&self) -> u64 {
        self.deliveries_dropped.load(Ordering::Relaxed)
    }

    pub fn target_metrics(&self, target: ScrapeTarget) -> Option<TargetMetrics> {
        self.per_target.read().get(&target).cloned()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_dispatched: self.jobs_dispatched.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            per_target: self.per_target.read().clone(),
        }
    }
}
