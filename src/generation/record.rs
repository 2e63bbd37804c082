//! Generation records and the clock they are timed against.

use crate::routes::ConcretePath;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// Build/cache status of one concrete path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationStatus {
    NotGenerated,
    Building,
    Ready,
    Stale,
    Errored,
}

/// Per-path generation state. Only the generation machine mutates records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub path: ConcretePath,
    pub status: GenerationStatus,
    pub generated_at: Option<DateTime<Utc>>,
    pub revalidate_seconds: u64,
    /// Number of builds started for this path
    pub builds: u32,
    /// Message of the most recent failed build, cleared on success
    pub last_error: Option<String>,
}

impl GenerationRecord {
    pub fn new(path: ConcretePath, revalidate_seconds: u64) -> Self {
        Self {
            path,
            status: GenerationStatus::NotGenerated,
            generated_at: None,
            revalidate_seconds,
            builds: 0,
            last_error: None,
        }
    }

    /// Whether the last successful render is older than the revalidation interval.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.generated_at {
            Some(generated_at) => {
                let limit_ms = i64::try_from(self.revalidate_seconds)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(1000);
                (now - generated_at).num_milliseconds() > limit_ms
            }
            None => false,
        }
    }

    /// Apply the time-triggered `Ready -> Stale` transition.
    pub(crate) fn refresh(&mut self, now: DateTime<Utc>) {
        if self.status == GenerationStatus::Ready && self.is_expired_at(now) {
            self.status = GenerationStatus::Stale;
        }
    }
}

/// Source of "now" for generation timestamps and staleness.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
