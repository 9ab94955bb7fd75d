//! Typed time quantities for scheduling.
//!
//! Intervals, penalties and lifetimes are carried as `qtty` quantities so a
//! minute can never be mistaken for a second. They become
//! [`std::time::Duration`] only where a timer is armed.

use std::time::Duration;

use qtty::{Quantity, Second, Unit};

/// Marker trait for units that share the same physical dimension.
///
/// Automatically implemented for any pair of units where
/// `From::Dim == To::Dim`, so `Minute: SameDim<Second>` holds while
/// `Meter: SameDim<Second>` does not compile.
pub trait SameDim<To: Unit>: Unit<Dim = To::Dim> {}

impl<From, To> SameDim<To> for From
where
    From: Unit,
    To: Unit<Dim = From::Dim>,
{
}

/// Converts a quantity between units of the same dimension.
#[inline]
pub const fn convert<From, To>(q: Quantity<From>) -> Quantity<To>
where
    From: SameDim<To>,
    To: Unit,
{
    q.to_const::<To>()
}

/// Shorthand for a quantity in seconds.
#[inline]
pub fn seconds(value: f64) -> Quantity<Second> {
    Quantity::new(value)
}

/// Timer duration for a time quantity.
///
/// Negative and NaN quantities become zero; values too large for a
/// `Duration` saturate.
pub fn to_duration<U: SameDim<Second>>(q: Quantity<U>) -> Duration {
    let secs: Quantity<Second> = convert(q);
    Duration::try_from_secs_f64(secs.value().max(0.0)).unwrap_or(Duration::MAX)
}
