//! Handlers for the standard action set.
//!
//! Each handler is thin: locate a target through the session's queries, walk
//! there, and call one or two world actions.

use async_trait::async_trait;

use super::registry::{ActionContext, ActionHandler, ActionRegistry};
use super::{crafting, Action, ActionError};
use crate::client::{BlockCriteria, BlockPos, BlockRef, EntityFilter, EntityKind, EntityRef, Goal, ItemKind, ResourceKind};

const SEARCH_RADIUS: f64 = 64.0;
const STRONGHOLD_RADIUS: f64 = 128.0;
const THREAT_RADIUS: f64 = 16.0;
const HUNT_RADIUS: f64 = 32.0;
const ALLY_RADIUS: f64 = 128.0;
const PORTAL_FRAME: u32 = 10;
const EYES_FOR_END: u32 = 12;
const SHELTER_BLOCKS: u32 = 4;

/// Registers the standard handler for every [`Action`].
pub fn register_all(registry: &mut ActionRegistry) {
    registry.register(Action::Explore, Explore { distance: 16.0 });
    registry.register(Action::GatherWood, Gather(ResourceKind::Wood));
    registry.register(Action::CraftWoodenPickaxe, Craft::tool(ItemKind::WoodenPickaxe));
    registry.register(Action::MineStone, Gather(ResourceKind::Stone));
    registry.register(Action::CraftStonePickaxe, Craft::tool(ItemKind::StonePickaxe));
    registry.register(Action::MineCoal, Gather(ResourceKind::Coal));
    registry.register(Action::MineIronOre, Gather(ResourceKind::IronOre));
    registry.register(Action::SmeltIron, Craft::items(ItemKind::IronIngot, 1));
    registry.register(Action::CraftIronPickaxe, Craft::tool(ItemKind::IronPickaxe));
    registry.register(Action::MineDiamond, Gather(ResourceKind::Diamond));
    registry.register(Action::CraftDiamondPickaxe, Craft::tool(ItemKind::DiamondPickaxe));
    registry.register(Action::MineObsidian, Gather(ResourceKind::Obsidian));
    registry.register(Action::BuildPortal, BuildPortal);
    registry.register(Action::EnterPortal, EnterPortal);
    registry.register(Action::CraftEyeOfEnder, Craft::items(ItemKind::EyeOfEnder, 1));
    registry.register(Action::AttackNearestEnemy, AttackNearestEnemy);
    registry.register(Action::FleeFromEnemy, FleeFromEnemy { distance: 24.0 });
    registry.register(Action::Eat, Eat);
    registry.register(Action::Sleep, Sleep);
    registry.register(Action::SeekAlly, SeekAlly);
    registry.register(Action::CollectDrops, CollectDrops);
    registry.register(Action::PlaceShelter, PlaceShelter);
    registry.register(Action::Idle, Idle);
}

async fn find_block(
    ctx: &mut ActionContext<'_>,
    kind: ResourceKind,
    radius: f64,
) -> Result<BlockRef, ActionError> {
    let criteria = BlockCriteria::new(ctx.game_data.block_names(kind), radius);
    ctx.session
        .find_block(&criteria)
        .await
        .ok_or_else(|| ActionError::NotFound(format!("{kind:?}").to_lowercase()))
}

async fn find_entity(
    ctx: &mut ActionContext<'_>,
    kinds: &[EntityKind],
    radius: f64,
    what: &str,
) -> Result<EntityRef, ActionError> {
    ctx.session
        .find_nearest_entity(&EntityFilter::new(kinds, radius))
        .await
        .ok_or_else(|| ActionError::NotFound(what.to_string()))
}

async fn walk_to(ctx: &mut ActionContext<'_>, position: BlockPos, range: f64) -> Result<(), ActionError> {
    ctx.session.navigate_to(Goal::Near { position, range }).await?;
    Ok(())
}

/// Walks away from the current position.
pub struct Explore {
    pub distance: f64,
}

#[async_trait]
impl ActionHandler for Explore {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let here = ctx.session.position();
        ctx.session
            .navigate_to(Goal::Away {
                position: here,
                distance: self.distance,
            })
            .await?;
        Ok(())
    }
}

/// Digs the nearest block of a resource kind.
pub struct Gather(pub ResourceKind);

#[async_trait]
impl ActionHandler for Gather {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let block = find_block(ctx, self.0, SEARCH_RADIUS).await?;
        walk_to(ctx, block.position, 1.0).await?;
        ctx.session.dig(&block).await?;
        Ok(())
    }
}

/// Crafts an item, including any missing intermediates.
pub struct Craft {
    pub item: ItemKind,
    pub count: u32,
    /// Refuse when one is already held.
    pub once: bool,
}

impl Craft {
    pub fn tool(item: ItemKind) -> Self {
        Self {
            item,
            count: 1,
            once: true,
        }
    }

    pub fn items(item: ItemKind, count: u32) -> Self {
        Self {
            item,
            count,
            once: false,
        }
    }
}

#[async_trait]
impl ActionHandler for Craft {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        if self.once && ctx.session.inventory_count(self.item) > 0 {
            return Err(ActionError::Precondition(format!("already holding {}", self.item)));
        }
        crafting::craft(&mut *ctx.session, ctx.game_data, self.item, self.count).await
    }
}

/// Obsidian positions of a minimal portal frame two blocks east of `origin`,
/// plus the interior block to light.
fn portal_frame(origin: BlockPos) -> (Vec<BlockPos>, BlockPos) {
    let at = |dz: i32, dy: i32| BlockPos::new(origin.x + 2, origin.y + dy, origin.z + dz);
    let mut frame = Vec::with_capacity(PORTAL_FRAME as usize);
    for dz in 1..=2 {
        frame.push(at(dz, 0));
        frame.push(at(dz, 4));
    }
    for dy in 1..=3 {
        frame.push(at(0, dy));
        frame.push(at(3, dy));
    }
    (frame, at(1, 1))
}

/// Places an obsidian frame and lights it.
pub struct BuildPortal;

#[async_trait]
impl ActionHandler for BuildPortal {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        if ctx.observation.portal_built >= 0.5 {
            return Err(ActionError::Precondition("portal already built".into()));
        }
        let obsidian = ctx.session.inventory_count(ItemKind::Obsidian);
        if obsidian < PORTAL_FRAME {
            return Err(ActionError::Missing {
                item: ItemKind::Obsidian,
                count: PORTAL_FRAME - obsidian,
            });
        }
        if ctx.session.inventory_count(ItemKind::FlintAndSteel) == 0 {
            crafting::craft(&mut *ctx.session, ctx.game_data, ItemKind::FlintAndSteel, 1).await?;
        }

        let (frame, interior) = portal_frame(ctx.session.position());
        for position in frame {
            ctx.session.place(ItemKind::Obsidian, position).await?;
        }
        ctx.session.activate(ItemKind::FlintAndSteel, interior).await?;
        Ok(())
    }
}

/// Steps through a nether portal, or opens the end portal once enough eyes
/// are held.
pub struct EnterPortal;

#[async_trait]
impl ActionHandler for EnterPortal {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        if ctx.observation.in_end >= 0.5 {
            return Err(ActionError::Precondition("already in the end".into()));
        }
        let eyes = ctx.session.inventory_count(ItemKind::EyeOfEnder);
        if ctx.observation.in_overworld >= 0.5 && eyes >= EYES_FOR_END {
            let portal = find_block(ctx, ResourceKind::EndPortal, STRONGHOLD_RADIUS).await?;
            walk_to(ctx, portal.position, 1.0).await?;
            ctx.session.activate(ItemKind::EyeOfEnder, portal.position).await?;
            return Ok(());
        }
        let portal = find_block(ctx, ResourceKind::Portal, SEARCH_RADIUS).await?;
        walk_to(ctx, portal.position, 0.0).await
    }
}

pub struct AttackNearestEnemy;

#[async_trait]
impl ActionHandler for AttackNearestEnemy {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let target = find_entity(ctx, &[EntityKind::Hostile, EntityKind::Dragon], THREAT_RADIUS, "enemy").await?;
        walk_to(ctx, target.position, 2.0).await?;
        ctx.session.attack(&target).await?;
        Ok(())
    }
}

pub struct FleeFromEnemy {
    pub distance: f64,
}

#[async_trait]
impl ActionHandler for FleeFromEnemy {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let threat = find_entity(ctx, &[EntityKind::Hostile, EntityKind::Dragon], THREAT_RADIUS, "enemy").await?;
        ctx.session
            .navigate_to(Goal::Away {
                position: threat.position,
                distance: self.distance,
            })
            .await?;
        Ok(())
    }
}

/// Eats held food, or hunts the nearest animal when there is none.
pub struct Eat;

#[async_trait]
impl ActionHandler for Eat {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        if ctx.session.inventory_count(ItemKind::Food) > 0 {
            ctx.session.consume(ItemKind::Food).await?;
            return Ok(());
        }
        let prey = find_entity(ctx, &[EntityKind::Animal], HUNT_RADIUS, "animal").await?;
        walk_to(ctx, prey.position, 2.0).await?;
        ctx.session.attack(&prey).await?;
        Ok(())
    }
}

pub struct Sleep;

#[async_trait]
impl ActionHandler for Sleep {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let bed = find_block(ctx, ResourceKind::Bed, HUNT_RADIUS).await?;
        walk_to(ctx, bed.position, 1.0).await?;
        ctx.session.sleep().await?;
        Ok(())
    }
}

pub struct SeekAlly;

#[async_trait]
impl ActionHandler for SeekAlly {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let ally = find_entity(ctx, &[EntityKind::Ally], ALLY_RADIUS, "ally").await?;
        walk_to(ctx, ally.position, 3.0).await
    }
}

pub struct CollectDrops;

#[async_trait]
impl ActionHandler for CollectDrops {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let item = find_entity(ctx, &[EntityKind::DroppedItem], THREAT_RADIUS, "dropped item").await?;
        walk_to(ctx, item.position, 1.0).await?;
        ctx.session.collect(&item).await?;
        Ok(())
    }
}

/// Walls the agent in with cobblestone on four sides.
pub struct PlaceShelter;

#[async_trait]
impl ActionHandler for PlaceShelter {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        let held = ctx.session.inventory_count(ItemKind::Cobblestone);
        if held < SHELTER_BLOCKS {
            return Err(ActionError::Missing {
                item: ItemKind::Cobblestone,
                count: SHELTER_BLOCKS - held,
            });
        }
        let p = ctx.session.position();
        for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            ctx.session
                .place(ItemKind::Cobblestone, BlockPos::new(p.x + dx, p.y, p.z + dz))
                .await?;
        }
        Ok(())
    }
}

pub struct Idle;

#[async_trait]
impl ActionHandler for Idle {
    async fn perform(&self, _ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionOutcome;
    use crate::client::{ConnectRequest, GameClient, GameDataTable, GameSession, SimulatedClient};
    use crate::identity::AgentIdentity;
    use crate::rl::Observation;

    async fn session() -> Box<dyn GameSession> {
        let request = ConnectRequest {
            host: "localhost".into(),
            port: 25565,
            identity: AgentIdentity::new("Handler").unwrap(),
            version_hint: None,
        };
        SimulatedClient::default().connect(request).await.unwrap().session
    }

    async fn run(session: &mut Box<dyn GameSession>, action: Action, observation: &Observation) -> ActionOutcome {
        let table = GameDataTable::for_version(&session.game_version());
        let registry = ActionRegistry::standard();
        let mut ctx = ActionContext {
            session: session.as_mut(),
            game_data: &table,
            observation,
        };
        registry.dispatch(action, &mut ctx).await
    }

    fn overworld() -> Observation {
        Observation {
            in_overworld: 1.0,
            ..Observation::default()
        }
    }

    #[tokio::test]
    async fn gather_wood_then_craft_a_pickaxe() {
        let mut s = session().await;
        let obs = overworld();
        assert_eq!(
            run(&mut s, Action::CraftWoodenPickaxe, &obs).await,
            ActionOutcome::Failed(ActionError::Missing {
                item: ItemKind::Log,
                count: 1
            })
        );
        for _ in 0..3 {
            assert!(run(&mut s, Action::GatherWood, &obs).await.succeeded());
        }
        assert!(run(&mut s, Action::CraftWoodenPickaxe, &obs).await.succeeded());
        assert_eq!(s.inventory_count(ItemKind::WoodenPickaxe), 1);

        let again = run(&mut s, Action::CraftWoodenPickaxe, &obs).await;
        assert!(matches!(again, ActionOutcome::Failed(ActionError::Precondition(_))));
    }

    #[tokio::test]
    async fn portal_needs_a_full_frame_of_obsidian() {
        let mut s = session().await;
        let outcome = run(&mut s, Action::BuildPortal, &overworld()).await;
        assert_eq!(
            outcome,
            ActionOutcome::Failed(ActionError::Missing {
                item: ItemKind::Obsidian,
                count: PORTAL_FRAME
            })
        );
    }

    #[tokio::test]
    async fn nothing_to_attack_in_daylight() {
        let mut s = session().await;
        let outcome = run(&mut s, Action::AttackNearestEnemy, &overworld()).await;
        assert_eq!(outcome, ActionOutcome::Failed(ActionError::NotFound("enemy".into())));
    }

    #[tokio::test]
    async fn explore_moves_the_agent() {
        let mut s = session().await;
        let before = s.position();
        assert!(run(&mut s, Action::Explore, &overworld()).await.succeeded());
        assert!(s.position().distance_to(&before) >= 16.0);
    }

    #[tokio::test]
    async fn idle_always_succeeds() {
        let mut s = session().await;
        assert!(run(&mut s, Action::Idle, &Observation::default()).await.succeeded());
    }

    #[test]
    fn portal_frame_has_ten_blocks_around_the_interior() {
        let (frame, interior) = portal_frame(BlockPos::new(0, 64, 0));
        assert_eq!(frame.len(), PORTAL_FRAME as usize);
        assert!(!frame.contains(&interior));
    }
}
