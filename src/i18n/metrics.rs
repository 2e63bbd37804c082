//! Translation loader metrics.
//!
//! Tracks bundle cache hits, misses, source reads and load failures. Each
//! loader owns its own counters so independent loaders never share numbers.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for one translation loader.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Number of times a bundle was already cached
    cache_hits: AtomicUsize,

    /// Number of times a bundle had to be loaded from the source
    cache_misses: AtomicUsize,

    /// Number of reads issued against the translation source (retries included)
    source_reads: AtomicUsize,

    /// Number of loads that ended in an error
    load_failures: AtomicUsize,

    /// Number of keys that resolved to the literal key
    unresolved_keys: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_read(&self) {
        self.source_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unresolved_key(&self) {
        self.unresolved_keys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn source_reads(&self) -> usize {
        self.source_reads.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> usize {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn unresolved_keys(&self) -> usize {
        self.unresolved_keys.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> TranslationMetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total = hits + misses;
        let cache_hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        TranslationMetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            source_reads: self.source_reads(),
            load_failures: self.load_failures(),
            unresolved_keys: self.unresolved_keys(),
        }
    }
}

/// Snapshot of translation loader statistics.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationMetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub source_reads: usize,
    pub load_failures: usize,
    pub unresolved_keys: usize,
}
