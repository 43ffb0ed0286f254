//! Metrics sink boundary.
//!
//! Codec and planner logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through CodecEvent and MetricsSink.
//!
//! This module is the only allowed bridge between codec passes
//! and the global metrics state.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// PlanKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlanKind {
    Key,
    Index,
}

///
/// CodecEvent
///

#[derive(Clone, Copy, Debug)]
pub enum CodecEvent {
    EncodePass,
    DecodePass,
    ChangePass,
    QualifierRouted { cache_hit: bool },
    CacheEvicted { count: u64 },
    PlanBuilt { kind: PlanKind },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: CodecEvent);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: CodecEvent) {
        metrics::with_state_mut(|m| match event {
            CodecEvent::EncodePass => {
                m.ops.encode_passes = m.ops.encode_passes.saturating_add(1);
            }
            CodecEvent::DecodePass => {
                m.ops.decode_passes = m.ops.decode_passes.saturating_add(1);
            }
            CodecEvent::ChangePass => {
                m.ops.change_passes = m.ops.change_passes.saturating_add(1);
            }
            CodecEvent::QualifierRouted { cache_hit } => {
                if cache_hit {
                    m.cache.route_hits = m.cache.route_hits.saturating_add(1);
                } else {
                    m.cache.route_misses = m.cache.route_misses.saturating_add(1);
                }
            }
            CodecEvent::CacheEvicted { count } => {
                m.cache.evictions = m.cache.evictions.saturating_add(1);
                m.cache.evicted_routes = m.cache.evicted_routes.saturating_add(count);
            }
            CodecEvent::PlanBuilt { kind } => match kind {
                PlanKind::Key => m.ops.plan_key = m.ops.plan_key.saturating_add(1),
                PlanKind::Index => m.ops.plan_index = m.ops.plan_index.saturating_add(1),
            },
        });
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: CodecEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - We materialize only a shared reference (`&dyn MetricsSink`), matching the
        //   original shared borrow used to install the override.
        // - No mutable alias to the same sink is created here.
        //
        // What would break this:
        // - If `with_metrics_sink` failed to restore on all exits (normal + panic),
        //   `ptr` could outlive the borrowed sink and become dangling.
        // - If `record` were changed to store or dispatch asynchronously using `ptr`,
        //   lifetime assumptions would no longer hold.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state for endpoint/test plumbing.
#[must_use]
pub fn metrics_report() -> metrics::EventState {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub(crate) fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    //
    // Aliasing:
    // - We erase lifetime to a raw pointer, but still only expose shared access.
    // - No mutable alias to the same sink is introduced by this conversion.
    //
    // What would break this:
    // - Any async/deferred use of `sink_ptr` beyond this scope.
    // - Any path that bypasses Guard restoration.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
