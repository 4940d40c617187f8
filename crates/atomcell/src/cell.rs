//! The versioned value cell: one value, one stamp, updated together.

use crate::clock::VersionStamp;

///
/// VersionedCell
///
/// Exclusive owner of the authoritative value. The stamp changes if and only
/// if the value is replaced through [`install`](Self::install); there is no
/// way to touch one field without the other.
///

#[derive(Debug)]
pub(crate) struct VersionedCell<T> {
    value: T,
    stamp: VersionStamp,
}

impl<T: Clone> VersionedCell<T> {
    pub const fn new(value: T, stamp: VersionStamp) -> Self {
        Self { value, stamp }
    }

    pub const fn stamp(&self) -> VersionStamp {
        self.stamp
    }

    /// Borrow the stored value. Crate-internal only; the value never crosses
    /// the public boundary by reference.
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Clone the value together with the stamp it was committed under.
    pub fn snapshot(&self) -> (T, VersionStamp) {
        (self.value.clone(), self.stamp)
    }

    /// Replace value and stamp in one step, returning the displaced value.
    pub fn install(&mut self, value: T, stamp: VersionStamp) -> T {
        self.stamp = stamp;
        std::mem::replace(&mut self.value, value)
    }
}

///
/// TESTS
///
