//! Watcher registry and the per-commit notification pass.
//!
//! Each watcher caches the canonical projection of the sub-value it observes;
//! a pass after a successful commit re-projects against the fresh value and
//! fires only the watchers whose projection actually changed.
//!
//! Reentrancy contract: the registry borrow is released around every action
//! call, so an action may freely call back into the owning atom (`get`,
//! `set*`, registration, cancellation). The pass visits the watcher ids that
//! were registered when it started; ids cancelled mid-pass are skipped when
//! reached, ids added mid-pass wait for the next pass. The cache is updated
//! before the action runs so a reentrant commit compares against the state
//! this pass already observed.

use crate::{
    clock::VersionStamp,
    error::ProjectionError,
    obs::{metrics, sink},
    path::Path,
};
use derive_more::Display;
use serde::Serialize;
use serde_json::Value;
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

///
/// WatcherId
///
/// Unique per registration; drawn from the owning atom's stamp clock, so ids
/// are monotonic and iteration follows registration order.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WatcherId(VersionStamp);

impl WatcherId {
    pub(crate) const fn new(stamp: VersionStamp) -> Self {
        Self(stamp)
    }
}

/// Change callback, invoked with (new, old) full-value copies owned by the
/// notification pass.
pub(crate) type Action<T> = Rc<dyn Fn(&T, &T)>;

///
/// Projection
///
/// How a watcher narrows the whole value down to the sub-value it observes.
///

pub(crate) enum Projection<T> {
    /// Pre-parsed dotted path resolved against the canonical JSON form.
    Path(Path),
    /// Caller-supplied projection function.
    Check(Box<dyn Fn(&T) -> Result<Value, ProjectionError>>),
}

fn project<T: Serialize>(
    projection: &Projection<T>,
    value: &T,
) -> Result<Value, ProjectionError> {
    match projection {
        Projection::Path(path) => serde_json::to_value(value)
            .map(|json| path.resolve(&json).clone())
            .map_err(|err| ProjectionError::Serialize(err.to_string())),
        Projection::Check(check) => check(value),
    }
}

/// Project, isolating failures: report out-of-band and observe null.
fn project_or_null<T: Serialize>(projection: &Projection<T>, value: &T) -> Value {
    project(projection, value).unwrap_or_else(|err| {
        metrics::with_state_mut(|m| {
            m.watch.projection_failures = m.watch.projection_failures.saturating_add(1);
        });
        sink::report_failure(&err.into());
        Value::Null
    })
}

///
/// Watcher
///

struct Watcher<T> {
    projection: Projection<T>,
    action: Action<T>,
    /// Canonical projection as of the last evaluation; change detection only.
    last_seen: Value,
}

///
/// WatcherRegistry
///

pub(crate) struct WatcherRegistry<T> {
    entries: BTreeMap<WatcherId, Watcher<T>>,
}

impl<T: Serialize> WatcherRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a watcher, capturing the current projection immediately so
    /// pre-existing state never fires.
    pub fn register(
        &mut self,
        id: WatcherId,
        projection: Projection<T>,
        action: Action<T>,
        current: &T,
    ) {
        let last_seen = project_or_null(&projection, current);

        self.entries.insert(
            id,
            Watcher {
                projection,
                action,
                last_seen,
            },
        );
    }

    pub fn remove(&mut self, id: WatcherId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn ids(&self) -> Vec<WatcherId> {
        self.entries.keys().copied().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Run one notification pass against a freshly committed value.
pub(crate) fn notify<T: Serialize>(
    registry: &RefCell<WatcherRegistry<T>>,
    new_value: &T,
    old_value: &T,
) {
    metrics::with_state_mut(|m| {
        m.watch.notify_passes = m.watch.notify_passes.saturating_add(1);
    });

    // snapshot of the registered ids; mid-pass mutation applies next pass
    let ids = registry.borrow().ids();

    for id in ids {
        let fired = {
            let mut reg = registry.borrow_mut();
            let Some(watcher) = reg.entries.get_mut(&id) else {
                // cancelled while this pass was running
                continue;
            };

            let projected = project_or_null(&watcher.projection, new_value);
            if projected == watcher.last_seen {
                None
            } else {
                watcher.last_seen = projected;
                Some(watcher.action.clone())
            }
        };

        if let Some(action) = fired {
            metrics::with_state_mut(|m| {
                m.watch.fires = m.watch.fires.saturating_add(1);
            });
            action(new_value, old_value);
        }
    }
}
