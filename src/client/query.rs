//! Plain-data filters for world queries.
//!
//! Queries cross the client boundary as records rather than closures, so a
//! query can be logged, compared and replayed in tests.

use super::world::BlockPos;

/// Broad entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Hostile,
    /// Another agent of the fleet.
    Ally,
    Animal,
    DroppedItem,
    Dragon,
}

/// Selects the nearest entity of any of `kinds` within `max_distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFilter {
    pub kinds: Vec<EntityKind>,
    pub max_distance: f64,
}

impl EntityFilter {
    pub fn new(kinds: impl Into<Vec<EntityKind>>, max_distance: f64) -> Self {
        Self {
            kinds: kinds.into(),
            max_distance,
        }
    }

    pub fn matches(&self, kind: EntityKind, distance: f64) -> bool {
        distance <= self.max_distance && self.kinds.contains(&kind)
    }
}

/// An entity returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    pub id: u32,
    pub kind: EntityKind,
    pub position: BlockPos,
    pub distance: f64,
}

/// Selects the nearest block whose name is in `names` within `max_distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCriteria {
    pub names: Vec<String>,
    pub max_distance: f64,
}

impl BlockCriteria {
    pub fn new(names: &[String], max_distance: f64) -> Self {
        Self {
            names: names.to_vec(),
            max_distance,
        }
    }

    pub fn matches(&self, name: &str, distance: f64) -> bool {
        distance <= self.max_distance && self.names.iter().any(|n| n == name)
    }
}

/// A block returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRef {
    pub name: String,
    pub position: BlockPos,
}

/// Navigation target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Goal {
    /// Get within `range` blocks of `position`.
    Near { position: BlockPos, range: f64 },
    /// Get at least `distance` blocks away from `position`.
    Away { position: BlockPos, distance: f64 },
}
