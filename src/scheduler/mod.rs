//! Slot scheduler.
//!
//! Owns the fixed array of agent slots and decides when each slot's next
//! connection attempt happens. Initial attempts are staggered
//! deterministically across `[base, max]`; every connection-class failure
//! anywhere in the fleet pushes every slot's future attempts back by one
//! penalty unit.
//!
//! [`SchedulerState`] is plain data with synchronous mutators. The fleet
//! event loop owns it and applies each mutation inside the handler that
//! observed the triggering event; timers are armed by the caller from the
//! returned [`WakePlan`]s.

pub mod error;
pub mod slot;
pub mod window;

#[cfg(test)]
mod tests;

use std::time::Duration;

use qtty::{Minute, Quantity, Second};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub use error::SchedulerError;
pub use slot::{Occupant, Slot, SlotPhase};
pub use window::Window;

use crate::units::{seconds, to_duration};

/// Timing parameters of the slot scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Number of slots, i.e. the maximum number of concurrent agents.
    pub agent_count: usize,
    /// Earliest offset of a slot's wake-up.
    pub base_interval_secs: u64,
    /// Latest offset of a slot's wake-up, before accumulated delay.
    pub max_interval_secs: u64,
    /// Delay added to every slot per connection-class failure.
    pub failure_penalty_secs: u64,
    /// Wait before the failed slot retries.
    pub failure_cooldown_secs: u64,
    /// Session lifetime in timed mode.
    pub lifetime_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            agent_count: 20,
            base_interval_secs: 300,
            max_interval_secs: 360,
            failure_penalty_secs: 60,
            failure_cooldown_secs: 60,
            lifetime_minutes: 100,
        }
    }
}

impl ScheduleConfig {
    pub fn base_interval(&self) -> Quantity<Second> {
        seconds(self.base_interval_secs as f64)
    }

    pub fn max_interval(&self) -> Quantity<Second> {
        seconds(self.max_interval_secs as f64)
    }

    /// `[base, max]`, the window every un-delayed wake-up falls in.
    pub fn window(&self) -> Window<Second> {
        Window::new(self.base_interval(), self.max_interval())
    }

    pub fn failure_penalty(&self) -> Quantity<Second> {
        seconds(self.failure_penalty_secs as f64)
    }

    pub fn failure_cooldown(&self) -> Quantity<Second> {
        seconds(self.failure_cooldown_secs as f64)
    }

    pub fn lifetime(&self) -> Quantity<Minute> {
        Quantity::new(self.lifetime_minutes as f64)
    }
}

/// Why a wake-up was planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// First attempt after fleet start.
    Initial,
    /// The previous occupant left normally.
    Rotation,
    /// The previous attempt failed with a connection error.
    Retry,
}

/// A one-shot timer the caller should arm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakePlan {
    pub slot: usize,
    pub delay: Quantity<Second>,
    pub reason: WakeReason,
}

impl WakePlan {
    pub fn duration(&self) -> Duration {
        to_duration(self.delay)
    }
}

/// What to do when a slot's timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeDecision {
    /// The slot is empty: create and connect an agent.
    Spawn,
    /// The occupant is still around; the wake-up is a no-op.
    Occupied(Uuid),
}

/// Slot array plus per-slot backoff.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    config: ScheduleConfig,
    slots: Vec<Slot>,
    global_failures: u64,
}

impl SchedulerState {
    pub fn new(config: ScheduleConfig) -> Result<Self, SchedulerError> {
        if config.agent_count == 0 {
            return Err(SchedulerError::NoSlots);
        }
        if config.base_interval_secs > config.max_interval_secs {
            return Err(SchedulerError::InvertedWindow {
                base: config.base_interval_secs,
                max: config.max_interval_secs,
            });
        }
        let slots = (0..config.agent_count).map(Slot::new).collect();
        Ok(Self {
            config,
            slots,
            global_failures: 0,
        })
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn slot(&self, index: usize) -> Result<&Slot, SchedulerError> {
        self.slots.get(index).ok_or(SchedulerError::SlotOutOfRange {
            slot: index,
            count: self.slots.len(),
        })
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot, SchedulerError> {
        let count = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(SchedulerError::SlotOutOfRange { slot: index, count })
    }

    /// `base + (slot mod (max - base + 1)) + accumulated_delay[slot]`.
    ///
    /// Deterministic: the same slot and delay always give the same interval.
    pub fn interval_for(&self, slot: usize) -> Result<Quantity<Second>, SchedulerError> {
        let s = self.slot(slot)?;
        let spread = (self.config.max_interval_secs - self.config.base_interval_secs).saturating_add(1);
        let stagger = seconds((slot as u64 % spread) as f64);
        Ok(self.config.base_interval() + stagger + s.accumulated_delay)
    }

    pub fn accumulated_delay(&self, slot: usize) -> Result<Quantity<Second>, SchedulerError> {
        Ok(self.slot(slot)?.accumulated_delay)
    }

    /// Pushes every slot's future wake-ups back by one penalty unit.
    ///
    /// Already-armed timers are not touched. There is no ceiling.
    pub fn record_global_failure(&mut self) {
        let penalty = self.config.failure_penalty();
        for slot in &mut self.slots {
            slot.accumulated_delay = slot.accumulated_delay + penalty;
        }
        self.global_failures += 1;
        debug!(
            failures = self.global_failures,
            penalty_secs = self.config.failure_penalty_secs,
            "global connection failure recorded"
        );
    }

    pub fn global_failures(&self) -> u64 {
        self.global_failures
    }

    /// Plans the next regular wake-up for `slot`.
    pub fn plan_wake(&self, slot: usize, reason: WakeReason) -> Result<WakePlan, SchedulerError> {
        Ok(WakePlan {
            slot,
            delay: self.interval_for(slot)?,
            reason,
        })
    }

    /// Plans the short retry after a connection failure on `slot`.
    pub fn plan_retry(&self, slot: usize) -> Result<WakePlan, SchedulerError> {
        self.slot(slot)?;
        Ok(WakePlan {
            slot,
            delay: self.config.failure_cooldown(),
            reason: WakeReason::Retry,
        })
    }

    /// One initial wake-up per slot.
    pub fn initial_plans(&self) -> Vec<WakePlan> {
        (0..self.slots.len())
            .filter_map(|slot| self.plan_wake(slot, WakeReason::Initial).ok())
            .collect()
    }

    /// Check-before-create: the only gate deciding whether a wake-up spawns.
    pub fn on_wake(&self, slot: usize) -> Result<WakeDecision, SchedulerError> {
        Ok(match self.slot(slot)?.occupant() {
            Some(occupant) => WakeDecision::Occupied(occupant.agent_id),
            None => WakeDecision::Spawn,
        })
    }

    /// Marks `slot` as held by a connecting agent.
    pub fn occupy(&mut self, slot: usize, occupant: Occupant) -> Result<(), SchedulerError> {
        let s = self.slot_mut(slot)?;
        if let Some(current) = &s.occupant {
            return Err(SchedulerError::SlotOccupied {
                slot,
                occupant: current.agent_id,
            });
        }
        s.occupant = Some(occupant);
        Ok(())
    }

    /// Moves the occupant to [`SlotPhase::Active`]. Returns false if `agent_id`
    /// no longer holds the slot.
    pub fn mark_active(&mut self, slot: usize, agent_id: Uuid) -> Result<bool, SchedulerError> {
        match self.slot_mut(slot)?.occupant.as_mut() {
            Some(occupant) if occupant.agent_id == agent_id => {
                occupant.phase = SlotPhase::Active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Clears `slot` if `agent_id` still holds it; a stale exit never evicts
    /// a newer occupant.
    pub fn vacate(&mut self, slot: usize, agent_id: Uuid) -> Result<Option<Occupant>, SchedulerError> {
        let s = self.slot_mut(slot)?;
        match &s.occupant {
            Some(current) if current.agent_id == agent_id => Ok(s.occupant.take()),
            _ => Ok(None),
        }
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Slot::is_occupied)
    }

    pub fn occupant(&self, slot: usize) -> Option<&Occupant> {
        self.slots.get(slot).and_then(Slot::occupant)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_occupied()).count()
    }

    /// Occupants of every held slot.
    pub fn occupants(&self) -> impl Iterator<Item = (usize, &Occupant)> {
        self.slots
            .iter()
            .filter_map(|s| s.occupant().map(|o| (s.index(), o)))
    }
}
