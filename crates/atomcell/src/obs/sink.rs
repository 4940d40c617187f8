//! Failure sink boundary.
//!
//! Commit and watch logic MUST NOT surface internal failures to callers;
//! the operations are contractually non-failing. Everything flows through
//! [`FailureSink`], and the only allowed override is the scoped one below.

use crate::{error::AtomError, obs::metrics};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn FailureSink>>> = const { RefCell::new(None) };
}

///
/// FailureSink
///

pub trait FailureSink {
    fn report(&self, error: &AtomError);
}

/// MetricsFailureSink
/// Default sink when no scoped override is installed; counts the report
/// into thread-local metrics and drops the payload.

pub(crate) struct MetricsFailureSink;

impl FailureSink for MetricsFailureSink {
    fn report(&self, _error: &AtomError) {
        metrics::with_state_mut(|m| {
            m.watch.failures_reported = m.watch.failures_reported.saturating_add(1);
        });
    }
}

/// Install `sink` for the duration of `f` on this thread.
pub fn with_sink<R>(sink: Rc<dyn FailureSink>, f: impl FnOnce() -> R) -> R {
    struct Reset;

    impl Drop for Reset {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|slot| *slot.borrow_mut() = None);
        }
    }

    SINK_OVERRIDE.with(|slot| *slot.borrow_mut() = Some(sink));
    let _reset = Reset;

    f()
}

/// Route a failure to the active sink.
pub(crate) fn report_failure(error: &AtomError) {
    let scoped = SINK_OVERRIDE.with(|slot| slot.borrow().clone());

    match scoped {
        Some(sink) => sink.report(error),
        None => MetricsFailureSink.report(error),
    }
}

///
/// TESTS
///
