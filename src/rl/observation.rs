//! Observation encoding for the decision loop.
//!
//! Turns a raw [`WorldSnapshot`] into a fixed 25-component vector with every
//! component in `[0, 1]`. Booleans encode as 0/1, counts are divided by a
//! known maximum and clamped.

use crate::client::{Dimension, ItemKind, WorldSnapshot};

/// Number of components in an observation vector.
pub const OBSERVATION_DIM: usize = 25;

const MAX_HEALTH: f64 = 20.0;
const MAX_FOOD: f64 = 20.0;
/// Distance at which hostiles and allies count as "nearby".
pub const PROXIMITY_RANGE: f64 = 16.0;
const STACK_SIZE: f64 = 64.0;
const MAX_EYES: f64 = 12.0;
const NIGHT_START: u32 = 13_000;
const NIGHT_END: u32 = 23_000;

/// Sticky per-episode progression flags that the world does not report
/// directly once the agent has moved on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Milestones {
    pub entered_nether: bool,
    pub entered_end: bool,
    pub dragon_defeated: bool,
}

impl Milestones {
    /// Folds a fresh snapshot into the milestone memory.
    pub fn update(&mut self, snapshot: &WorldSnapshot) {
        match snapshot.dimension {
            Dimension::Nether => self.entered_nether = true,
            Dimension::End => self.entered_end = true,
            Dimension::Overworld => {}
        }
        self.dragon_defeated |= snapshot.dragon_defeated;
    }
}

/// Normalised agent + environment state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    pub health: f64,
    pub food: f64,
    pub enemy_nearby: f64,
    /// `1 - distance / range` for the closest hostile, 0 when none.
    pub enemy_proximity: f64,
    pub just_died: f64,

    // --- Resources ---
    pub wood: f64,
    pub stone: f64,
    pub coal: f64,
    pub iron_ore: f64,
    pub iron_ingot: f64,
    pub obsidian: f64,
    pub eye_of_ender: f64,

    // --- Tools ---
    pub wooden_pickaxe: f64,
    pub stone_pickaxe: f64,
    pub iron_pickaxe: f64,
    pub diamond_pickaxe: f64,

    // --- Progression ---
    pub portal_built: f64,
    pub in_overworld: f64,
    pub in_nether: f64,
    pub in_end: f64,
    pub entered_nether: f64,
    pub entered_end: f64,
    pub dragon_defeated: f64,

    // --- Surroundings ---
    pub ally_nearby: f64,
    pub is_night: f64,
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn ratio(value: f64, max: f64) -> f64 {
    (value / max).clamp(0.0, 1.0)
}

fn proximity(distance: Option<f64>) -> f64 {
    match distance {
        Some(d) if d <= PROXIMITY_RANGE => (1.0 - d / PROXIMITY_RANGE).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

impl Observation {
    /// Builds an observation from a world snapshot and the agent's milestone memory.
    pub fn from_snapshot(snapshot: &WorldSnapshot, milestones: &Milestones) -> Self {
        let count = |item: ItemKind| snapshot.count(item) as f64;
        let enemy_near = snapshot
            .nearest_enemy
            .is_some_and(|d| d <= PROXIMITY_RANGE);
        let ally_near = snapshot.nearest_ally.is_some_and(|d| d <= PROXIMITY_RANGE);
        let night = (NIGHT_START..NIGHT_END).contains(&(snapshot.time_of_day % 24_000));

        Self {
            health: ratio(snapshot.health, MAX_HEALTH),
            food: ratio(snapshot.food, MAX_FOOD),
            enemy_nearby: flag(enemy_near),
            enemy_proximity: proximity(snapshot.nearest_enemy),
            just_died: flag(snapshot.dead),
            wood: ratio(count(ItemKind::Log), STACK_SIZE),
            stone: ratio(count(ItemKind::Cobblestone), STACK_SIZE),
            coal: ratio(count(ItemKind::Coal), STACK_SIZE),
            iron_ore: ratio(count(ItemKind::IronOre), STACK_SIZE),
            iron_ingot: ratio(count(ItemKind::IronIngot), STACK_SIZE),
            obsidian: ratio(count(ItemKind::Obsidian), STACK_SIZE),
            eye_of_ender: ratio(count(ItemKind::EyeOfEnder), MAX_EYES),
            wooden_pickaxe: flag(snapshot.count(ItemKind::WoodenPickaxe) > 0),
            stone_pickaxe: flag(snapshot.count(ItemKind::StonePickaxe) > 0),
            iron_pickaxe: flag(snapshot.count(ItemKind::IronPickaxe) > 0),
            diamond_pickaxe: flag(snapshot.count(ItemKind::DiamondPickaxe) > 0),
            portal_built: flag(snapshot.portal_built),
            in_overworld: flag(snapshot.dimension == Dimension::Overworld),
            in_nether: flag(snapshot.dimension == Dimension::Nether),
            in_end: flag(snapshot.dimension == Dimension::End),
            entered_nether: flag(milestones.entered_nether),
            entered_end: flag(milestones.entered_end),
            dragon_defeated: flag(milestones.dragon_defeated),
            ally_nearby: flag(ally_near),
            is_night: flag(night),
        }
    }

    /// Flattens the observation into the approximator's input layout.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.health,
            self.food,
            self.enemy_nearby,
            self.enemy_proximity,
            self.just_died,
            self.wood,
            self.stone,
            self.coal,
            self.iron_ore,
            self.iron_ingot,
            self.obsidian,
            self.eye_of_ender,
            self.wooden_pickaxe,
            self.stone_pickaxe,
            self.iron_pickaxe,
            self.diamond_pickaxe,
            self.portal_built,
            self.in_overworld,
            self.in_nether,
            self.in_end,
            self.entered_nether,
            self.entered_end,
            self.dragon_defeated,
            self.ally_nearby,
            self.is_night,
        ]
    }

    pub fn is_dead(&self) -> bool {
        self.just_died >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WorldSnapshot {
        let mut s = WorldSnapshot::fresh();
        s.inventory.insert(ItemKind::Log, 200);
        s.inventory.insert(ItemKind::EyeOfEnder, 3);
        s.inventory.insert(ItemKind::StonePickaxe, 1);
        s.nearest_enemy = Some(4.0);
        s.nearest_ally = Some(40.0);
        s.time_of_day = 14_000;
        s
    }

    #[test]
    fn vector_has_fixed_dimension() {
        let obs = Observation::from_snapshot(&snapshot(), &Milestones::default());
        assert_eq!(obs.to_vec().len(), OBSERVATION_DIM);
    }

    #[test]
    fn every_component_is_normalised() {
        let mut s = snapshot();
        s.health = 35.0;
        s.food = -3.0;
        let obs = Observation::from_snapshot(&s, &Milestones::default());
        for v in obs.to_vec() {
            assert!((0.0..=1.0).contains(&v), "component {v} out of range");
        }
    }

    #[test]
    fn counts_clamp_and_scale() {
        let obs = Observation::from_snapshot(&snapshot(), &Milestones::default());
        assert_eq!(obs.wood, 1.0);
        assert!((obs.eye_of_ender - 0.25).abs() < 1e-12);
        assert_eq!(obs.stone_pickaxe, 1.0);
        assert_eq!(obs.iron_pickaxe, 0.0);
    }

    #[test]
    fn proximity_and_night_flags() {
        let obs = Observation::from_snapshot(&snapshot(), &Milestones::default());
        assert_eq!(obs.enemy_nearby, 1.0);
        assert!((obs.enemy_proximity - 0.75).abs() < 1e-12);
        assert_eq!(obs.ally_nearby, 0.0);
        assert_eq!(obs.is_night, 1.0);
    }

    #[test]
    fn milestones_are_sticky() {
        let mut m = Milestones::default();
        let mut s = snapshot();
        s.dimension = Dimension::Nether;
        m.update(&s);
        s.dimension = Dimension::Overworld;
        m.update(&s);
        let obs = Observation::from_snapshot(&s, &m);
        assert_eq!(obs.entered_nether, 1.0);
        assert_eq!(obs.in_nether, 0.0);
        assert_eq!(obs.in_overworld, 1.0);
    }
}
