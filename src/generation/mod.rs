//! Page generation: per-path records, single-flight builds and serving decisions.
//!
//! - `record`: `GenerationRecord`, its status and the clock it is timed against
//! - `machine`: the state machine that owns every record
//! - `metrics`: build and serve counters

mod machine;
mod metrics;
mod record;

pub use machine::{
    BuildReport, CacheStatus, GenerationMachine, Peek, RenderedPage, Renderer, Serve,
};
pub use metrics::{GenerationMetrics, GenerationMetricsReport};
pub use record::{Clock, GenerationRecord, GenerationStatus, ManualClock, SystemClock};
