//! Module: obs
//! Responsibility: runtime telemetry for codec passes, cache behavior, and
//! scan planning.
//! Does not own: any codec or planner logic; callers emit events, this
//! module counts them.
//! Boundary: instrumentation flows through `CodecEvent` and `MetricsSink`
//! only; nothing here reads codec state.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{CacheCounters, EventOps, EventState};
pub use sink::{CodecEvent, MetricsSink, PlanKind, metrics_report, metrics_reset_all};

pub(crate) use sink::record;
