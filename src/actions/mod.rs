//! The agent's action space and its dispatch table.
//!
//! [`Action`] ids are the output indices of the Q-network, so the order of
//! [`Action::ALL`] is part of every persisted model.

pub mod crafting;
pub mod error;
pub mod handlers;
pub mod registry;

use std::fmt;

pub use error::ActionError;
pub use registry::{ActionContext, ActionHandler, ActionOutcome, ActionRegistry};

/// Number of actions, i.e. the Q-network output width.
pub const ACTION_COUNT: usize = 23;

/// High-level actions an agent can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Explore,
    GatherWood,
    CraftWoodenPickaxe,
    MineStone,
    CraftStonePickaxe,
    MineCoal,
    MineIronOre,
    SmeltIron,
    CraftIronPickaxe,
    MineDiamond,
    CraftDiamondPickaxe,
    MineObsidian,
    BuildPortal,
    EnterPortal,
    CraftEyeOfEnder,
    AttackNearestEnemy,
    FleeFromEnemy,
    Eat,
    Sleep,
    SeekAlly,
    CollectDrops,
    PlaceShelter,
    Idle,
}

impl Action {
    pub const ALL: [Action; ACTION_COUNT] = [
        Action::Explore,
        Action::GatherWood,
        Action::CraftWoodenPickaxe,
        Action::MineStone,
        Action::CraftStonePickaxe,
        Action::MineCoal,
        Action::MineIronOre,
        Action::SmeltIron,
        Action::CraftIronPickaxe,
        Action::MineDiamond,
        Action::CraftDiamondPickaxe,
        Action::MineObsidian,
        Action::BuildPortal,
        Action::EnterPortal,
        Action::CraftEyeOfEnder,
        Action::AttackNearestEnemy,
        Action::FleeFromEnemy,
        Action::Eat,
        Action::Sleep,
        Action::SeekAlly,
        Action::CollectDrops,
        Action::PlaceShelter,
        Action::Idle,
    ];

    /// Output index of this action.
    pub fn id(self) -> usize {
        self as usize
    }

    pub fn from_id(id: usize) -> Option<Action> {
        Action::ALL.get(id).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Explore => "explore",
            Action::GatherWood => "gather_wood",
            Action::CraftWoodenPickaxe => "craft_wooden_pickaxe",
            Action::MineStone => "mine_stone",
            Action::CraftStonePickaxe => "craft_stone_pickaxe",
            Action::MineCoal => "mine_coal",
            Action::MineIronOre => "mine_iron_ore",
            Action::SmeltIron => "smelt_iron",
            Action::CraftIronPickaxe => "craft_iron_pickaxe",
            Action::MineDiamond => "mine_diamond",
            Action::CraftDiamondPickaxe => "craft_diamond_pickaxe",
            Action::MineObsidian => "mine_obsidian",
            Action::BuildPortal => "build_portal",
            Action::EnterPortal => "enter_portal",
            Action::CraftEyeOfEnder => "craft_eye_of_ender",
            Action::AttackNearestEnemy => "attack_nearest_enemy",
            Action::FleeFromEnemy => "flee_from_enemy",
            Action::Eat => "eat",
            Action::Sleep => "sleep",
            Action::SeekAlly => "seek_ally",
            Action::CollectDrops => "collect_drops",
            Action::PlaceShelter => "place_shelter",
            Action::Idle => "idle",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_a_bijection() {
        for (i, action) in Action::ALL.iter().enumerate() {
            assert_eq!(action.id(), i);
            assert_eq!(Action::from_id(i), Some(*action));
        }
        assert_eq!(Action::from_id(ACTION_COUNT), None);
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = Action::ALL.iter().map(|a| a.name()).collect();
        assert_eq!(names.len(), ACTION_COUNT);
    }
}
