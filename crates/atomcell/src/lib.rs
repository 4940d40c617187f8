//! atomcell: single-writer-at-a-time mutable cells with optimistic
//! concurrency control, structural copy isolation, and deep-path change
//! watchers.
//!
//! An [`atom::Atom`] holds one value and the stamp of its last commit. Every
//! update is computed against a private snapshot and commits only if nothing
//! else committed in between; a lost race either re-runs the mutator against
//! fresh state or falls through to a conflict handler. Watchers observe a
//! dotted path (or an arbitrary projection) of the value and fire once per
//! settled change, only when the projected sub-value actually differs.

// public exports are one module level down
pub mod atom;
pub mod clock;
pub mod error;
pub mod obs;
pub mod path;
pub mod watch;

pub(crate) mod cell;


///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No sinks, metrics, or registries are re-exported here.
///

pub mod prelude {
    pub use crate::{
        atom::{Atom, Commit, Subscription},
        clock::VersionStamp,
        path::Path,
        watch::WatcherId,
    };
}
