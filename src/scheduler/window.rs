//! Closed time window `[start, end]`.

use std::fmt::Display;

use qtty::{Quantity, Unit};

/// Range of times at which a wake-up may fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window<U: Unit> {
    start: Quantity<U>,
    end: Quantity<U>,
}

impl<U: Unit> Window<U> {
    /// Window between `a` and `b`, in whichever order they are given.
    pub fn new(a: Quantity<U>, b: Quantity<U>) -> Self {
        if a.value() <= b.value() {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub const fn start(&self) -> Quantity<U> {
        self.start
    }

    pub const fn end(&self) -> Quantity<U> {
        self.end
    }

    /// Returns true if `t` ∈ `[start, end]`.
    pub const fn contains(&self, t: Quantity<U>) -> bool {
        self.start.value() <= t.value() && t.value() <= self.end.value()
    }

    /// The same window moved later by `offset`.
    pub fn shifted(&self, offset: Quantity<U>) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

impl<U: Unit> Display for Window<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.0}, {:.0}]", self.start.value(), self.end.value())
    }
}
