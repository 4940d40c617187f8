//! Version stamp source.
//!
//! Stamps order commits and nothing else; they are never interpreted as
//! wall-clock time. The generator keeps its previous stamp and increments
//! when the OS clock is too coarse to distinguish two readings, so stamps
//! strictly increase even within the same microsecond.

use derive_more::Display;
use std::{
    cell::Cell,
    time::{SystemTime, UNIX_EPOCH},
};

/// Low bits reserved for same-reading sequence increments.
const SEQ_BITS: u32 = 16;

///
/// VersionStamp
///
/// Opaque, totally ordered commit marker with sub-millisecond resolution.
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct VersionStamp(u128);

impl VersionStamp {
    pub const MIN: Self = Self(u128::MIN);

    const fn from_micros(micros: u128) -> Self {
        Self(micros << SEQ_BITS)
    }

    const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw ordering key, exposed for diagnostics only.
    #[must_use]
    pub const fn get(self) -> u128 {
        self.0
    }
}

///
/// StampClock
///
/// Per-atom monotonic stamp generator. Same scheme as a monotonic ULID
/// generator: take a fresh clock reading when time advanced, otherwise
/// increment the previous stamp.
///

#[derive(Debug, Default)]
pub struct StampClock {
    previous: Cell<VersionStamp>,
}

impl StampClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a stamp strictly greater than every stamp issued before it.
    pub fn stamp(&self) -> VersionStamp {
        let candidate = VersionStamp::from_micros(now_micros());
        let previous = self.previous.get();

        // maybe time went backward, or it is the same reading.
        // increment instead so that stamps stay monotonic.
        let stamp = if candidate > previous {
            candidate
        } else {
            previous.next()
        };

        self.previous.set(stamp);
        stamp
    }
}

fn now_micros() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_micros())
}

///
/// TESTS
///
