//! The atom: a versioned, copy-isolated mutable cell with optimistic
//! commit/retry semantics and deep-path change watchers.
//!
//! Scheduling is single-threaded cooperative: `Atom` is `Clone` but not
//! `Send`, and "concurrency" means temporally overlapping logical updates.
//! A continuation may hold its [`Commit`] handle across an arbitrary delay
//! while other updates commit first; the version-stamp check in
//! [`Commit::accept`] is what defends against exactly that race.
//!
//! Nothing here blocks and nothing here returns an error: a lost race either
//! retries the original mutator against fresh state (`set` family) or falls
//! through to the conflict handler (`set_once` family).

use crate::{
    cell::VersionedCell,
    clock::{StampClock, VersionStamp},
    error::{AtomError, ProjectionError},
    obs::{metrics, sink},
    path::Path,
    watch::{self, Action, Projection, WatcherId, WatcherRegistry},
};
use serde::Serialize;
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

/// Continuation-form mutator: invoked with a private snapshot and a commit
/// handle it may call zero or more times, now or later.
type Mutator<T> = Rc<dyn Fn(T, Commit<T>)>;

///
/// ConflictPolicy
///
/// What a stale commit attempt does after returning `false`.
///

enum ConflictPolicy {
    /// Re-run the original mutator against a fresh snapshot.
    Retry,
    /// Invoke the handler (if any) and drop the update.
    Report(Option<Rc<dyn Fn()>>),
}

impl Clone for ConflictPolicy {
    fn clone(&self) -> Self {
        match self {
            Self::Retry => Self::Retry,
            Self::Report(handler) => Self::Report(handler.clone()),
        }
    }
}

///
/// AtomInner
///

struct AtomInner<T> {
    cell: RefCell<VersionedCell<T>>,
    watchers: RefCell<WatcherRegistry<T>>,
    clock: StampClock,
    /// Maximum automatic retries for the `set` family; `None` is unbounded.
    retry_limit: Option<u32>,
}

///
/// Atom
///
/// Shared handle to one versioned cell. Cloning the handle shares the cell;
/// the stored value itself is never shared, every boundary crossing is a
/// structural copy.
///

pub struct Atom<T> {
    inner: Rc<AtomInner<T>>,
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Serialize + 'static> Atom<T> {
    /// Build an atom around an initial value. Retries are unbounded, matching
    /// the semantics of a mutator that keeps re-running until it commits.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::build(initial, None)
    }

    /// Build an atom whose `set` family gives up (and reports through the
    /// failure sink) after `limit` stale attempts.
    #[must_use]
    pub fn with_retry_limit(initial: T, limit: u32) -> Self {
        Self::build(initial, Some(limit))
    }

    fn build(initial: T, retry_limit: Option<u32>) -> Self {
        let clock = StampClock::new();
        let stamp = clock.stamp();

        Self {
            inner: Rc::new(AtomInner {
                cell: RefCell::new(VersionedCell::new(initial, stamp)),
                watchers: RefCell::new(WatcherRegistry::new()),
                clock,
                retry_limit,
            }),
        }
    }

    /// Structural copy of the current value. The caller may mutate the result
    /// freely without affecting the cell.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.cell.borrow().value().clone()
    }

    /// Stamp of the last successful commit.
    #[must_use]
    pub fn version(&self) -> VersionStamp {
        self.inner.cell.borrow().stamp()
    }

    /// Propose a new value computed from a snapshot of the current one,
    /// retrying against fresh state if another update commits first.
    pub fn set(&self, mutator: impl Fn(T) -> T + 'static) {
        dispatch(
            &self.inner,
            synchronize(mutator),
            ConflictPolicy::Retry,
            0,
        );
    }

    /// Continuation form of [`set`](Self::set): the mutator receives a
    /// [`Commit`] handle it may invoke zero or more times, possibly after the
    /// call has returned.
    pub fn set_with(&self, mutator: impl Fn(T, Commit<T>) + 'static) {
        dispatch(&self.inner, Rc::new(mutator), ConflictPolicy::Retry, 0);
    }

    /// Fire-and-forget update: a lost race is silently dropped.
    pub fn set_once(&self, mutator: impl Fn(T) -> T + 'static) {
        dispatch(
            &self.inner,
            synchronize(mutator),
            ConflictPolicy::Report(None),
            0,
        );
    }

    /// Continuation form of [`set_once`](Self::set_once).
    pub fn set_once_with(&self, mutator: impl Fn(T, Commit<T>) + 'static) {
        dispatch(&self.inner, Rc::new(mutator), ConflictPolicy::Report(None), 0);
    }

    /// Like [`set_once`](Self::set_once), invoking `on_conflict` for every
    /// stale commit attempt instead of retrying.
    pub fn set_once_or(&self, mutator: impl Fn(T) -> T + 'static, on_conflict: impl Fn() + 'static) {
        dispatch(
            &self.inner,
            synchronize(mutator),
            ConflictPolicy::Report(Some(Rc::new(on_conflict))),
            0,
        );
    }

    /// Continuation form of [`set_once_or`](Self::set_once_or).
    pub fn set_once_with_or(
        &self,
        mutator: impl Fn(T, Commit<T>) + 'static,
        on_conflict: impl Fn() + 'static,
    ) {
        dispatch(
            &self.inner,
            Rc::new(mutator),
            ConflictPolicy::Report(Some(Rc::new(on_conflict))),
            0,
        );
    }

    /// Watch the sub-value at a dotted path (empty path: the whole value).
    /// The action fires once per settled change of the projection, with
    /// (new, old) full-value copies. The current projection is captured
    /// immediately, so pre-existing state never fires.
    pub fn on_change(&self, path: &str, action: impl Fn(&T, &T) + 'static) -> Subscription<T> {
        self.register(Projection::Path(Path::parse(path)), Rc::new(action))
    }

    /// Watch a caller-supplied projection instead of a path.
    pub fn on_change_with<U: Serialize>(
        &self,
        check: impl Fn(&T) -> U + 'static,
        action: impl Fn(&T, &T) + 'static,
    ) -> Subscription<T> {
        let check = move |value: &T| {
            serde_json::to_value(check(value))
                .map_err(|err| ProjectionError::Serialize(err.to_string()))
        };

        self.register(Projection::Check(Box::new(check)), Rc::new(action))
    }

    fn register(&self, projection: Projection<T>, action: Action<T>) -> Subscription<T> {
        let id = WatcherId::new(self.inner.clock.stamp());

        {
            let cell = self.inner.cell.borrow();
            self.inner
                .watchers
                .borrow_mut()
                .register(id, projection, action, cell.value());
        }

        metrics::with_state_mut(|m| {
            m.watch.registered = m.watch.registered.saturating_add(1);
        });

        Subscription {
            inner: Rc::downgrade(&self.inner),
            id,
        }
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }
}

/// Wrap a synchronous mutator into continuation form.
fn synchronize<T: Clone + Serialize + 'static>(mutator: impl Fn(T) -> T + 'static) -> Mutator<T> {
    Rc::new(move |snapshot, commit: Commit<T>| {
        commit.accept(mutator(snapshot));
    })
}

/// Snapshot the cell and run the mutator with a commit handle closed over the
/// snapshot's stamp. The cell borrow is released before the mutator runs, so
/// the mutator may call back into the atom.
fn dispatch<T: Clone + Serialize + 'static>(
    inner: &Rc<AtomInner<T>>,
    mutator: Mutator<T>,
    policy: ConflictPolicy,
    attempt: u32,
) {
    let (snapshot, stamp) = inner.cell.borrow().snapshot();

    let commit = Commit {
        inner: Rc::downgrade(inner),
        expected: stamp,
        mutator: Rc::clone(&mutator),
        policy,
        attempt,
    };

    mutator(snapshot, commit);
}

///
/// Commit
///
/// Handle for accepting a proposed value against the snapshot it was computed
/// from. Cloneable and long-lived: a continuation may stash it and call
/// [`accept`](Self::accept) well after the originating `set` returned.
///

pub struct Commit<T> {
    inner: Weak<AtomInner<T>>,
    expected: VersionStamp,
    mutator: Mutator<T>,
    policy: ConflictPolicy,
    /// Stale attempts already burned by this dispatch chain.
    attempt: u32,
}

impl<T> Clone for Commit<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            expected: self.expected,
            mutator: Rc::clone(&self.mutator),
            policy: self.policy.clone(),
            attempt: self.attempt,
        }
    }
}

impl<T: Clone + Serialize + 'static> Commit<T> {
    /// Attempt to commit `value`. Succeeds (returns `true`) only if the cell
    /// has not advanced past the snapshot this handle was issued for; watcher
    /// notification runs synchronously before returning.
    ///
    /// On a stale stamp this returns `false` after applying the conflict
    /// policy: the `set` family re-runs its original mutator against the
    /// now-current value, the `set_once` family reports and drops. Every call
    /// checks the same captured stamp, so invoking a stale handle repeatedly
    /// keeps re-issuing the retry.
    pub fn accept(&self, value: T) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            // the atom is gone; nothing to commit into, nothing to retry
            return false;
        };

        let displaced = {
            let mut cell = inner.cell.borrow_mut();
            if cell.stamp() == self.expected {
                let stamp = inner.clock.stamp();
                Some(cell.install(value.clone(), stamp))
            } else {
                None
            }
        };

        match displaced {
            Some(old_value) => {
                metrics::with_state_mut(|m| {
                    m.ops.commits = m.ops.commits.saturating_add(1);
                });
                watch::notify(&inner.watchers, &value, &old_value);
                true
            }
            None => {
                metrics::with_state_mut(|m| {
                    m.ops.stale_commits = m.ops.stale_commits.saturating_add(1);
                });
                self.conflict(&inner);
                false
            }
        }
    }

    /// The stamp this handle's snapshot was taken under.
    #[must_use]
    pub const fn expected(&self) -> VersionStamp {
        self.expected
    }

    fn conflict(&self, inner: &Rc<AtomInner<T>>) {
        match &self.policy {
            ConflictPolicy::Retry => {
                if let Some(limit) = inner.retry_limit
                    && self.attempt >= limit
                {
                    metrics::with_state_mut(|m| {
                        m.ops.retries_exhausted = m.ops.retries_exhausted.saturating_add(1);
                    });
                    sink::report_failure(&AtomError::retry_exhausted(
                        self.attempt.saturating_add(1),
                    ));
                    return;
                }

                metrics::with_state_mut(|m| {
                    m.ops.retries = m.ops.retries.saturating_add(1);
                });
                dispatch(
                    inner,
                    Rc::clone(&self.mutator),
                    ConflictPolicy::Retry,
                    self.attempt.saturating_add(1),
                );
            }
            ConflictPolicy::Report(handler) => {
                if let Some(on_conflict) = handler {
                    on_conflict();
                }
            }
        }
    }
}

///
/// Subscription
///
/// Cancellation handle returned by `on_change`. Dropping it does NOT cancel
/// the watcher; only [`cancel`](Self::cancel) does, and calling it more than
/// once (or after the atom is gone) is harmless.
///

pub struct Subscription<T> {
    inner: Weak<AtomInner<T>>,
    id: WatcherId,
}

impl<T: Serialize> Subscription<T> {
    /// Remove the watcher. Returns whether it was still registered.
    pub fn cancel(&self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };

        let removed = inner.watchers.borrow_mut().remove(self.id);
        if removed {
            metrics::with_state_mut(|m| {
                m.watch.cancelled = m.watch.cancelled.saturating_add(1);
            });
        }

        removed
    }

    #[must_use]
    pub const fn id(&self) -> WatcherId {
        self.id
    }
}
