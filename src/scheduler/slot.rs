use qtty::{Quantity, Second};
use uuid::Uuid;

use crate::identity::AgentIdentity;

/// How far the occupying agent has got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    /// Session requested, join not yet confirmed.
    Connecting,
    Active,
}

/// The agent currently holding a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub agent_id: Uuid,
    pub identity: AgentIdentity,
    pub phase: SlotPhase,
}

impl Occupant {
    pub fn connecting(agent_id: Uuid, identity: AgentIdentity) -> Self {
        Self {
            agent_id,
            identity,
            phase: SlotPhase::Connecting,
        }
    }
}

/// One reusable scheduling position.
///
/// The accumulated delay only ever grows for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    index: usize,
    pub(super) occupant: Option<Occupant>,
    pub(super) accumulated_delay: Quantity<Second>,
}

impl Slot {
    pub(super) fn new(index: usize) -> Self {
        Self {
            index,
            occupant: None,
            accumulated_delay: Quantity::new(0.0),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        self.occupant.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    pub fn accumulated_delay(&self) -> Quantity<Second> {
        self.accumulated_delay
    }
}
