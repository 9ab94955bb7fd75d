//! Raw world state as reported by a session.

use std::collections::BTreeMap;
use std::fmt;

/// Game dimension the agent is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    #[default]
    Overworld,
    Nether,
    End,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Overworld => write!(f, "overworld"),
            Dimension::Nether => write!(f, "the_nether"),
            Dimension::End => write!(f, "the_end"),
        }
    }
}

/// Inventory items the agent reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Log,
    Planks,
    Stick,
    CraftingTable,
    Cobblestone,
    Furnace,
    Coal,
    IronOre,
    IronIngot,
    Diamond,
    Obsidian,
    FlintAndSteel,
    BlazePowder,
    EnderPearl,
    EyeOfEnder,
    WoodenPickaxe,
    StonePickaxe,
    IronPickaxe,
    DiamondPickaxe,
    Sword,
    Food,
}

impl ItemKind {
    pub const ALL: [ItemKind; 21] = [
        ItemKind::Log,
        ItemKind::Planks,
        ItemKind::Stick,
        ItemKind::CraftingTable,
        ItemKind::Cobblestone,
        ItemKind::Furnace,
        ItemKind::Coal,
        ItemKind::IronOre,
        ItemKind::IronIngot,
        ItemKind::Diamond,
        ItemKind::Obsidian,
        ItemKind::FlintAndSteel,
        ItemKind::BlazePowder,
        ItemKind::EnderPearl,
        ItemKind::EyeOfEnder,
        ItemKind::WoodenPickaxe,
        ItemKind::StonePickaxe,
        ItemKind::IronPickaxe,
        ItemKind::DiamondPickaxe,
        ItemKind::Sword,
        ItemKind::Food,
    ];

    /// Canonical item id.
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Log => "oak_log",
            ItemKind::Planks => "oak_planks",
            ItemKind::Stick => "stick",
            ItemKind::CraftingTable => "crafting_table",
            ItemKind::Cobblestone => "cobblestone",
            ItemKind::Furnace => "furnace",
            ItemKind::Coal => "coal",
            ItemKind::IronOre => "raw_iron",
            ItemKind::IronIngot => "iron_ingot",
            ItemKind::Diamond => "diamond",
            ItemKind::Obsidian => "obsidian",
            ItemKind::FlintAndSteel => "flint_and_steel",
            ItemKind::BlazePowder => "blaze_powder",
            ItemKind::EnderPearl => "ender_pearl",
            ItemKind::EyeOfEnder => "ender_eye",
            ItemKind::WoodenPickaxe => "wooden_pickaxe",
            ItemKind::StonePickaxe => "stone_pickaxe",
            ItemKind::IronPickaxe => "iron_pickaxe",
            ItemKind::DiamondPickaxe => "diamond_pickaxe",
            ItemKind::Sword => "stone_sword",
            ItemKind::Food => "cooked_beef",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Block position in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &BlockPos) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Point-in-time read of everything the decision loop observes.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    /// Health points, 0..=20.
    pub health: f64,
    /// Food points, 0..=20.
    pub food: f64,
    /// Set on the tick the agent died.
    pub dead: bool,
    pub dimension: Dimension,
    /// Ticks into the day, 0..24000.
    pub time_of_day: u32,
    /// Distance to the closest hostile mob.
    pub nearest_enemy: Option<f64>,
    /// Distance to the closest cooperating agent.
    pub nearest_ally: Option<f64>,
    pub portal_built: bool,
    pub dragon_defeated: bool,
    pub inventory: BTreeMap<ItemKind, u32>,
}

impl WorldSnapshot {
    /// Full health and food, empty inventory, overworld at dawn.
    pub fn fresh() -> Self {
        Self {
            health: 20.0,
            food: 20.0,
            dead: false,
            dimension: Dimension::Overworld,
            time_of_day: 0,
            nearest_enemy: None,
            nearest_ally: None,
            portal_built: false,
            dragon_defeated: false,
            inventory: BTreeMap::new(),
        }
    }

    pub fn count(&self, item: ItemKind) -> u32 {
        self.inventory.get(&item).copied().unwrap_or(0)
    }
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self::fresh()
    }
}
