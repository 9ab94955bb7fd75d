//! Crafting planner.
//!
//! Expands a target item into the ordered crafting steps that the current
//! inventory allows, crafting missing intermediates and stations on the way.
//! Raw materials that cannot be crafted surface as [`ActionError::Missing`].

use std::collections::HashMap;

use super::ActionError;
use crate::client::{GameDataTable, GameSession, ItemKind};

const MAX_DEPTH: usize = 8;

pub type Inventory = HashMap<ItemKind, u32>;

/// One `craft(item, batches)` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CraftStep {
    pub item: ItemKind,
    pub batches: u32,
}

/// Reads every known item count from the session.
pub fn inventory_of(session: &dyn GameSession) -> Inventory {
    ItemKind::ALL
        .into_iter()
        .map(|item| (item, session.inventory_count(item)))
        .filter(|(_, n)| *n > 0)
        .collect()
}

/// Steps needed to end up holding `count` more of `item` than the plan uses.
pub fn plan(
    table: &GameDataTable,
    inventory: &Inventory,
    item: ItemKind,
    count: u32,
) -> Result<Vec<CraftStep>, ActionError> {
    let mut inventory = inventory.clone();
    let mut steps = Vec::new();
    expand(table, &mut inventory, item, count, &mut steps, 0)?;
    Ok(steps)
}

fn expand(
    table: &GameDataTable,
    inventory: &mut Inventory,
    item: ItemKind,
    needed: u32,
    steps: &mut Vec<CraftStep>,
    depth: usize,
) -> Result<(), ActionError> {
    let have = inventory.get(&item).copied().unwrap_or(0);
    if have >= needed {
        inventory.insert(item, have - needed);
        return Ok(());
    }
    let missing = needed - have;
    let recipe = match table.recipe(item) {
        Some(recipe) if depth < MAX_DEPTH => recipe,
        _ => return Err(ActionError::Missing { item, count: missing }),
    };

    if let Some(station) = recipe.station {
        if inventory.get(&station).copied().unwrap_or(0) == 0 {
            expand(table, inventory, station, 1, steps, depth + 1)?;
            // stations are held, not consumed
            *inventory.entry(station).or_insert(0) += 1;
        }
    }

    let batches = missing.div_ceil(recipe.output);
    for &(input, n) in recipe.inputs {
        expand(table, inventory, input, n * batches, steps, depth + 1)?;
    }
    steps.push(CraftStep { item, batches });
    inventory.insert(item, have + batches * recipe.output - needed);
    Ok(())
}

/// Plans and performs the crafts for `count` of `item`.
pub async fn craft(
    session: &mut dyn GameSession,
    table: &GameDataTable,
    item: ItemKind,
    count: u32,
) -> Result<(), ActionError> {
    let steps = plan(table, &inventory_of(session), item, count)?;
    for step in steps {
        session.craft(step.item, step.batches).await?;
    }
    Ok(())
}
