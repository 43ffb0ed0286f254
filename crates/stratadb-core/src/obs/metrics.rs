use serde::{Deserialize, Serialize};
use std::cell::RefCell;

///
/// EventState
/// Ephemeral, in-memory counters for codec passes and cache behavior.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub cache: CacheCounters,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Codec entrypoints
    pub encode_passes: u64,
    pub decode_passes: u64,
    pub change_passes: u64,

    // Planner outputs
    pub plan_key: u64,
    pub plan_index: u64,
}

///
/// CacheCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CacheCounters {
    pub route_hits: u64,
    pub route_misses: u64,
    pub evictions: u64,
    pub evicted_routes: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Snapshot the current counters.
#[must_use]
pub fn report() -> EventState {
    with_state(Clone::clone)
}

///
/// TESTS
///
