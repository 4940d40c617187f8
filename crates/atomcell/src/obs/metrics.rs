use std::cell::RefCell;

///
/// MetricsReport
/// Ephemeral, in-memory counters for atom operations on this thread.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MetricsReport {
    pub ops: OpCounters,
    pub watch: WatchCounters,
}

///
/// OpCounters
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OpCounters {
    pub commits: u64,
    pub stale_commits: u64,
    pub retries: u64,
    pub retries_exhausted: u64,
}

///
/// WatchCounters
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WatchCounters {
    pub registered: u64,
    pub cancelled: u64,
    pub notify_passes: u64,
    pub fires: u64,
    pub projection_failures: u64,
    pub failures_reported: u64,
}

thread_local! {
    static METRICS_STATE: RefCell<MetricsReport> = RefCell::new(MetricsReport::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&MetricsReport) -> R) -> R {
    METRICS_STATE.with(|state| f(&state.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut MetricsReport) -> R) -> R {
    METRICS_STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Clone the current counters.
#[must_use]
pub fn metrics_report() -> MetricsReport {
    with_state(Clone::clone)
}

/// Zero all counters on this thread.
pub fn metrics_reset() {
    with_state_mut(|state| *state = MetricsReport::default());
}

///
/// TESTS
///
