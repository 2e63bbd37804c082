//! Page generation counters.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct GenerationMetrics {
    builds_started: AtomicUsize,
    builds_succeeded: AtomicUsize,
    builds_failed: AtomicUsize,
    /// Callers that joined a build already in flight
    coalesced_waits: AtomicUsize,
    fresh_hits: AtomicUsize,
    stale_serves: AtomicUsize,
    not_found: AtomicUsize,
}

impl GenerationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_build_started(&self) {
        self.builds_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build_succeeded(&self) {
        self.builds_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build_failed(&self) {
        self.builds_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fresh_hit(&self) {
        self.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_serve(&self) {
        self.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn builds_started(&self) -> usize {
        self.builds_started.load(Ordering::Relaxed)
    }

    pub fn builds_succeeded(&self) -> usize {
        self.builds_succeeded.load(Ordering::Relaxed)
    }

    pub fn builds_failed(&self) -> usize {
        self.builds_failed.load(Ordering::Relaxed)
    }

    pub fn coalesced_waits(&self) -> usize {
        self.coalesced_waits.load(Ordering::Relaxed)
    }

    pub fn stale_serves(&self) -> usize {
        self.stale_serves.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> GenerationMetricsReport {
        GenerationMetricsReport {
            builds_started: self.builds_started(),
            builds_succeeded: self.builds_succeeded(),
            builds_failed: self.builds_failed(),
            coalesced_waits: self.coalesced_waits(),
            fresh_hits: self.fresh_hits.load(Ordering::Relaxed),
            stale_serves: self.stale_serves(),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetricsReport {
    pub builds_started: usize,
    pub builds_succeeded: usize,
    pub builds_failed: usize,
    pub coalesced_waits: usize,
    pub fresh_hits: usize,
    pub stale_serves: usize,
    pub not_found: usize,
}
