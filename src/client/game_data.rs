//! Block-name tables for the protocol version a server speaks.
//!
//! Built once after the first successful connection and shared read-only by
//! every agent.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::world::ItemKind;

/// Resource categories actions search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Wood,
    Stone,
    Coal,
    IronOre,
    Diamond,
    Obsidian,
    Lava,
    Bed,
    Portal,
    EndPortal,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Coal,
        ResourceKind::IronOre,
        ResourceKind::Diamond,
        ResourceKind::Obsidian,
        ResourceKind::Lava,
        ResourceKind::Bed,
        ResourceKind::Portal,
        ResourceKind::EndPortal,
    ];
}

/// How one item is made: `inputs` are consumed per batch, the `station`
/// must be held but is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    pub inputs: &'static [(ItemKind, u32)],
    pub output: u32,
    pub station: Option<ItemKind>,
}

/// Immutable mapping from resource kinds to concrete block names.
#[derive(Debug, Clone, PartialEq)]
pub struct GameDataTable {
    version: String,
    blocks: HashMap<ResourceKind, Vec<String>>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Minor component of a `1.X[.Y]` version string.
fn minor_version(version: &str) -> Option<u32> {
    version.split('.').nth(1)?.parse().ok()
}

impl GameDataTable {
    /// Builds the table for `version` (e.g. `"1.20.1"`).
    ///
    /// Versions before 1.13 use the legacy unflattened names; 1.17+ adds
    /// deepslate ore variants. Unparseable versions get the modern table.
    pub fn for_version(version: &str) -> Self {
        let minor = minor_version(version).unwrap_or(u32::MAX);
        let mut blocks = HashMap::new();

        if minor < 13 {
            blocks.insert(ResourceKind::Wood, names(&["log", "log2"]));
            blocks.insert(ResourceKind::Stone, names(&["stone", "cobblestone"]));
            blocks.insert(ResourceKind::Coal, names(&["coal_ore"]));
            blocks.insert(ResourceKind::IronOre, names(&["iron_ore"]));
            blocks.insert(ResourceKind::Diamond, names(&["diamond_ore"]));
            blocks.insert(ResourceKind::Lava, names(&["lava", "flowing_lava"]));
            blocks.insert(ResourceKind::Bed, names(&["bed"]));
            blocks.insert(ResourceKind::Portal, names(&["portal"]));
        } else {
            blocks.insert(
                ResourceKind::Wood,
                names(&[
                    "oak_log",
                    "birch_log",
                    "spruce_log",
                    "jungle_log",
                    "acacia_log",
                    "dark_oak_log",
                ]),
            );
            blocks.insert(ResourceKind::Stone, names(&["stone", "cobblestone"]));
            let (coal, iron, diamond) = if minor >= 17 {
                (
                    names(&["coal_ore", "deepslate_coal_ore"]),
                    names(&["iron_ore", "deepslate_iron_ore"]),
                    names(&["diamond_ore", "deepslate_diamond_ore"]),
                )
            } else {
                (names(&["coal_ore"]), names(&["iron_ore"]), names(&["diamond_ore"]))
            };
            blocks.insert(ResourceKind::Coal, coal);
            blocks.insert(ResourceKind::IronOre, iron);
            blocks.insert(ResourceKind::Diamond, diamond);
            blocks.insert(ResourceKind::Lava, names(&["lava"]));
            blocks.insert(
                ResourceKind::Bed,
                names(&["white_bed", "red_bed", "blue_bed", "black_bed"]),
            );
            blocks.insert(ResourceKind::Portal, names(&["nether_portal"]));
        }
        blocks.insert(ResourceKind::Obsidian, names(&["obsidian"]));
        blocks.insert(ResourceKind::EndPortal, names(&["end_portal"]));

        Self {
            version: version.to_string(),
            blocks,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Block names that count as `kind`.
    pub fn block_names(&self, kind: ResourceKind) -> &[String] {
        self.blocks.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Crafting or smelting recipe for `item`; raw materials have none.
    pub fn recipe(&self, item: ItemKind) -> Option<Recipe> {
        use ItemKind::*;
        let (inputs, output, station): (&'static [(ItemKind, u32)], u32, Option<ItemKind>) =
            match item {
                Planks => (&[(Log, 1)], 4, None),
                Stick => (&[(Planks, 2)], 4, None),
                CraftingTable => (&[(Planks, 4)], 1, None),
                WoodenPickaxe => (&[(Planks, 3), (Stick, 2)], 1, Some(CraftingTable)),
                StonePickaxe => (&[(Cobblestone, 3), (Stick, 2)], 1, Some(CraftingTable)),
                IronPickaxe => (&[(IronIngot, 3), (Stick, 2)], 1, Some(CraftingTable)),
                DiamondPickaxe => (&[(Diamond, 3), (Stick, 2)], 1, Some(CraftingTable)),
                Sword => (&[(Cobblestone, 2), (Stick, 1)], 1, Some(CraftingTable)),
                Furnace => (&[(Cobblestone, 8)], 1, Some(CraftingTable)),
                IronIngot => (&[(IronOre, 1), (Coal, 1)], 1, Some(Furnace)),
                FlintAndSteel => (&[(IronIngot, 1)], 1, None),
                EyeOfEnder => (&[(EnderPearl, 1), (BlazePowder, 1)], 1, None),
                _ => return None,
            };
        Some(Recipe {
            inputs,
            output,
            station,
        })
    }

    /// The resource kind a block name belongs to, if any.
    pub fn classify(&self, block: &str) -> Option<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| self.block_names(*kind).iter().any(|n| n == block))
    }
}

/// Write-once holder for the fleet's shared [`GameDataTable`].
#[derive(Debug, Clone, Default)]
pub struct GameDataCell(Arc<OnceLock<Arc<GameDataTable>>>);

impl GameDataCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table, building it from `version` on first use.
    ///
    /// Later calls return the first table regardless of `version`.
    pub fn get_or_init(&self, version: &str) -> Arc<GameDataTable> {
        self.0
            .get_or_init(|| Arc::new(GameDataTable::for_version(version)))
            .clone()
    }

    pub fn get(&self) -> Option<Arc<GameDataTable>> {
        self.0.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modern_table_has_deepslate_ores() {
        let t = GameDataTable::for_version("1.20.1");
        assert!(t
            .block_names(ResourceKind::IronOre)
            .contains(&"deepslate_iron_ore".to_string()));
        assert_eq!(t.classify("birch_log"), Some(ResourceKind::Wood));
    }

    #[test]
    fn legacy_table_uses_unflattened_names() {
        let t = GameDataTable::for_version("1.12.2");
        assert_eq!(t.block_names(ResourceKind::Wood), &["log", "log2"]);
        assert_eq!(t.classify("oak_log"), None);
    }

    #[test]
    fn pre_deepslate_modern_table() {
        let t = GameDataTable::for_version("1.16.5");
        assert_eq!(t.block_names(ResourceKind::Coal), &["coal_ore"]);
    }

    #[test]
    fn raw_materials_have_no_recipe() {
        let t = GameDataTable::for_version("1.20.1");
        assert!(t.recipe(ItemKind::Log).is_none());
        let smelt = t.recipe(ItemKind::IronIngot).unwrap();
        assert_eq!(smelt.station, Some(ItemKind::Furnace));
    }

    #[test]
    fn cell_initialises_once() {
        let cell = GameDataCell::new();
        assert!(cell.get().is_none());
        let first = cell.get_or_init("1.12.2");
        let second = cell.clone().get_or_init("1.20.1");
        assert_eq!(first.version(), "1.12.2");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
