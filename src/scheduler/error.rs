use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the slot scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Slot {slot} is out of range (fleet has {count} slots)")]
    SlotOutOfRange { slot: usize, count: usize },

    #[error("Slot {slot} is already occupied by agent {occupant}")]
    SlotOccupied { slot: usize, occupant: Uuid },

    #[error("Fleet must have at least one slot")]
    NoSlots,

    #[error("Interval bounds are inverted: base {base}s > max {max}s")]
    InvertedWindow { base: u64, max: u64 },
}
