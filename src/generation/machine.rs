//! The generation state machine.
//!
//! Every concrete path owns one [`GenerationRecord`]. Builds are single-flight:
//! a path has at most one build in flight, and everyone who needs that build
//! (build-time batch, blocking requests, stale revalidation) awaits the same
//! shared future. Builds run as detached tasks so a dropped request never
//! strands a record in `Building`.

use super::metrics::GenerationMetrics;
use super::record::{Clock, GenerationRecord, GenerationStatus, SystemClock};
use crate::assembler::{PageAssembler, PageProps};
use crate::error::BuildFailure;
use crate::routes::{ConcretePath, FallbackPolicy, RouteCatalogue};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

/// Turns page props into markup. Implemented by the rendering layer.
pub trait Renderer: Send + Sync {
    fn render(&self, props: Arc<PageProps>) -> BoxFuture<'static, anyhow::Result<String>>;
}

impl<F, Fut> Renderer for F
where
    F: Fn(Arc<PageProps>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    fn render(&self, props: Arc<PageProps>) -> BoxFuture<'static, anyhow::Result<String>> {
        Box::pin(self(props))
    }
}

/// A successful render of one path.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub path: ConcretePath,
    pub markup: String,
    pub props: Arc<PageProps>,
    pub generated_at: DateTime<Utc>,
}

/// How a served page relates to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Pre-rendered and within its revalidation interval
    Hit,
    /// Previous render, served while a rebuild runs
    Stale,
    /// Built on demand for this request
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Outcome of serving a request for a path.
#[derive(Debug, Clone)]
pub enum Serve {
    Page {
        page: Arc<RenderedPage>,
        cache: CacheStatus,
    },
    NotFound,
    /// The on-demand build this request waited for failed
    Failed(BuildFailure),
}

/// Outcome of a non-suspending lookup.
#[derive(Debug, Clone)]
pub enum Peek {
    Page {
        page: Arc<RenderedPage>,
        cache: CacheStatus,
    },
    /// A build is running; serving now would have meant waiting for it
    Pending,
    NotFound,
}

/// Result of a build-time batch.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub built: Vec<ConcretePath>,
    pub failed: Vec<(ConcretePath, BuildFailure)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

type BuildOutcome = Result<Arc<RenderedPage>, BuildFailure>;
type SharedBuild = Shared<BoxFuture<'static, BuildOutcome>>;

struct Entry {
    record: GenerationRecord,
    /// Last good render, kept through staleness and failed rebuilds
    page: Option<Arc<RenderedPage>>,
    in_flight: Option<SharedBuild>,
}

enum Plan {
    Fresh(Arc<RenderedPage>),
    Stale(Arc<RenderedPage>),
    Wait(SharedBuild),
    NotFound,
}

struct Inner {
    catalogue: Arc<RouteCatalogue>,
    assembler: PageAssembler,
    renderer: Arc<dyn Renderer>,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<ConcretePath, Entry>>,
    metrics: GenerationMetrics,
}

impl Inner {
    fn lock_records(&self) -> MutexGuard<'_, HashMap<ConcretePath, Entry>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn revalidate_for(&self, path: &ConcretePath) -> u64 {
        self.catalogue
            .template(&path.slug)
            .map(|template| template.revalidate_seconds)
            .unwrap_or(crate::routes::DEFAULT_REVALIDATE_SECONDS)
    }

    async fn render(&self, path: &ConcretePath, previous: Option<DateTime<Utc>>) -> BuildOutcome {
        let failure = |message: String| BuildFailure {
            path: path.url(),
            message,
        };

        let props = self
            .assembler
            .assemble(path, previous)
            .await
            .map_err(|e| failure(e.to_string()))?;
        let props = Arc::new(props);

        let markup = self
            .renderer
            .render(Arc::clone(&props))
            .await
            .map_err(|e| failure(format!("{:#}", e)))?;

        Ok(Arc::new(RenderedPage {
            path: path.clone(),
            markup,
            props,
            generated_at: self.clock.now(),
        }))
    }
}

/// Start a build for the entry, or join the one already in flight.
///
/// Must be called with the record table locked.
fn start_or_join(inner: &Arc<Inner>, entry: &mut Entry) -> SharedBuild {
    if let Some(build) = &entry.in_flight {
        inner.metrics.record_coalesced_wait();
        return build.clone();
    }

    entry.record.status = GenerationStatus::Building;
    entry.record.builds += 1;
    inner.metrics.record_build_started();
    debug!(
        "Building {} (build #{})",
        entry.record.path, entry.record.builds
    );

    let path = entry.record.path.clone();
    let previous = entry.record.generated_at;
    let build = run_build(Arc::clone(inner), path, previous)
        .boxed()
        .shared();

    entry.in_flight = Some(build.clone());
    tokio::spawn(build.clone());
    build
}

async fn run_build(
    inner: Arc<Inner>,
    path: ConcretePath,
    previous: Option<DateTime<Utc>>,
) -> BuildOutcome {
    // Panics become build failures so the record always leaves Building
    let outcome = match AssertUnwindSafe(inner.render(&path, previous))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => Err(BuildFailure {
            path: path.url(),
            message: format!("renderer panicked: {}", panic_message(&*panic)),
        }),
    };

    {
        let mut records = inner.lock_records();
        if let Some(entry) = records.get_mut(&path) {
            entry.in_flight = None;
            match &outcome {
                Ok(page) => {
                    entry.record.status = GenerationStatus::Ready;
                    entry.record.generated_at = Some(page.generated_at);
                    entry.record.last_error = None;
                    entry.page = Some(Arc::clone(page));
                }
                Err(failure) => {
                    entry.record.status = GenerationStatus::Errored;
                    entry.record.last_error = Some(failure.message.clone());
                }
            }
        }
    }

    match &outcome {
        Ok(_) => inner.metrics.record_build_succeeded(),
        Err(failure) => {
            inner.metrics.record_build_failed();
            error!("{}", failure);
        }
    }

    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Decide how to serve `path`, starting a build when one is needed.
fn plan(inner: &Arc<Inner>, path: &ConcretePath) -> Plan {
    let Ok(template) = inner.catalogue.template(&path.slug) else {
        return Plan::NotFound;
    };
    let policy = template.fallback;
    let revalidate_seconds = template.revalidate_seconds;
    let now = inner.clock.now();

    let mut records = inner.lock_records();
    let seen = records
        .get(path)
        .map(|entry| entry.record.status != GenerationStatus::NotGenerated)
        .unwrap_or(false);
    if !seen && policy == FallbackPolicy::Unavailable {
        return Plan::NotFound;
    }

    let entry = records.entry(path.clone()).or_insert_with(|| Entry {
        record: GenerationRecord::new(path.clone(), revalidate_seconds),
        page: None,
        in_flight: None,
    });
    entry.record.refresh(now);

    let status = entry.record.status;
    match (entry.page.clone(), status) {
        (Some(page), GenerationStatus::Ready) => Plan::Fresh(page),
        (Some(page), _) => {
            // Stale, or a failed rebuild: serve the last good render and rebuild behind it
            if status != GenerationStatus::Building {
                let _ = start_or_join(inner, entry);
            }
            if entry.record.is_expired_at(now) {
                Plan::Stale(page)
            } else {
                Plan::Fresh(page)
            }
        }
        // Errored paths were referenced before, so they retry whatever the policy
        (None, _) => Plan::Wait(start_or_join(inner, entry)),
    }
}

/// Per-path build and cache state for every page of the site.
#[derive(Clone)]
pub struct GenerationMachine {
    inner: Arc<Inner>,
}

impl GenerationMachine {
    pub fn new(
        catalogue: Arc<RouteCatalogue>,
        assembler: PageAssembler,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self::with_clock(catalogue, assembler, renderer, Arc::new(SystemClock))
    }

    pub fn with_clock(
        catalogue: Arc<RouteCatalogue>,
        assembler: PageAssembler,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalogue,
                assembler,
                renderer,
                clock,
                records: Mutex::new(HashMap::new()),
                metrics: GenerationMetrics::new(),
            }),
        }
    }

    pub fn metrics(&self) -> &GenerationMetrics {
        &self.inner.metrics
    }

    pub fn assembler(&self) -> &PageAssembler {
        &self.inner.assembler
    }

    /// Snapshot of one record, with staleness applied as of now.
    pub fn record(&self, path: &ConcretePath) -> Option<GenerationRecord> {
        let now = self.inner.clock.now();
        let mut records = self.inner.lock_records();
        records.get_mut(path).map(|entry| {
            entry.record.refresh(now);
            entry.record.clone()
        })
    }

    /// Snapshot of every record, ordered by path.
    pub fn records(&self) -> Vec<GenerationRecord> {
        let now = self.inner.clock.now();
        let mut records = self.inner.lock_records();
        let mut snapshot: Vec<_> = records
            .values_mut()
            .map(|entry| {
                entry.record.refresh(now);
                entry.record.clone()
            })
            .collect();
        snapshot.sort_by(|a, b| a.path.cmp(&b.path));
        snapshot
    }

    /// Build `path` now (or join the build in flight) and wait for the result.
    pub async fn build(&self, path: &ConcretePath) -> Result<Arc<RenderedPage>, BuildFailure> {
        let build = {
            let mut records = self.inner.lock_records();
            let revalidate_seconds = self.inner.revalidate_for(path);
            let entry = records.entry(path.clone()).or_insert_with(|| Entry {
                record: GenerationRecord::new(path.clone(), revalidate_seconds),
                page: None,
                in_flight: None,
            });
            start_or_join(&self.inner, entry)
        };
        build.await
    }

    /// Build every path with at most `concurrency` builds running at once.
    ///
    /// A failed path never stops the batch; failures are collected in the report.
    pub async fn build_all<I>(&self, paths: I, concurrency: usize) -> BuildReport
    where
        I: IntoIterator<Item = ConcretePath>,
    {
        let outcomes: Vec<(ConcretePath, Result<Arc<RenderedPage>, BuildFailure>)> =
            stream::iter(paths)
                .map(|path| async move {
                    let outcome = self.build(&path).await;
                    (path, outcome)
                })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;

        let mut report = BuildReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(_) => report.built.push(path),
                Err(failure) => report.failed.push((path, failure)),
            }
        }
        report.built.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));

        info!(
            "Build finished: {} built, {} failed",
            report.built.len(),
            report.failed.len()
        );
        report
    }

    /// Serve a request for `path`.
    ///
    /// Fresh and stale renders return immediately (a stale render schedules a
    /// rebuild). A path without any render waits for its build when the route's
    /// fallback is blocking, and is not found otherwise.
    pub async fn serve(&self, path: &ConcretePath) -> Serve {
        match plan(&self.inner, path) {
            Plan::Fresh(page) => {
                self.inner.metrics.record_fresh_hit();
                Serve::Page {
                    page,
                    cache: CacheStatus::Hit,
                }
            }
            Plan::Stale(page) => {
                self.inner.metrics.record_stale_serve();
                Serve::Page {
                    page,
                    cache: CacheStatus::Stale,
                }
            }
            Plan::Wait(build) => match build.await {
                Ok(page) => Serve::Page {
                    page,
                    cache: CacheStatus::Miss,
                },
                Err(failure) => Serve::Failed(failure),
            },
            Plan::NotFound => {
                self.inner.metrics.record_not_found();
                Serve::NotFound
            }
        }
    }

    /// Like [`serve`](Self::serve) but never waits: where `serve` would block,
    /// the build is started (or left running) and `Pending` is returned.
    ///
    /// # Panics
    ///
    /// Builds are spawned onto the current Tokio runtime, so this panics when
    /// called outside one and a build has to be started.
    pub fn peek(&self, path: &ConcretePath) -> Peek {
        match plan(&self.inner, path) {
            Plan::Fresh(page) => {
                self.inner.metrics.record_fresh_hit();
                Peek::Page {
                    page,
                    cache: CacheStatus::Hit,
                }
            }
            Plan::Stale(page) => {
                self.inner.metrics.record_stale_serve();
                Peek::Page {
                    page,
                    cache: CacheStatus::Stale,
                }
            }
            Plan::Wait(_) => Peek::Pending,
            Plan::NotFound => {
                self.inner.metrics.record_not_found();
                Peek::NotFound
            }
        }
    }
}
