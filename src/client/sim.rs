//! In-process game backend.
//!
//! Each session owns a small seeded world: resource blocks scattered around the
//! agent, a crafting tree with tool tiers, hunger, hostile spawns at night,
//! portals and the three dimensions. Sessions of one [`SimulatedClient`] see
//! each other as [`EntityKind::Ally`] entities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::error::ClientError;
use super::game_data::{GameDataTable, ResourceKind};
use super::query::{BlockCriteria, BlockRef, EntityFilter, EntityKind, EntityRef, Goal};
use super::world::{BlockPos, Dimension, ItemKind, WorldSnapshot};
use super::{ConnectRequest, Connection, GameClient, GameSession, SessionEvent, SessionId};
use crate::identity::AgentIdentity;

/// Game ticks that pass per world step (one step per snapshot).
const TICKS_PER_STEP: u32 = 40;
const DAY_LENGTH: u32 = 24_000;
const NIGHT: std::ops::Range<u32> = 13_000..23_000;
const REACH: f64 = 4.5;
const PORTAL_FRAME_SIZE: u32 = 10;
const EYES_REQUIRED: u32 = 12;
const DRAGON_HEALTH: f64 = 60.0;
const MAX_HOSTILES: usize = 3;
const ALLY_ID_BASE: u32 = 1_000_000;

/// Knobs for [`SimulatedClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions {
    /// Version reported by sessions unless the request carries a hint.
    pub version: String,
    /// The first `refuse_attempts` connection attempts are refused.
    pub refuse_attempts: usize,
    pub seed: u64,
    /// Probability in [0, 1] that a world action fails spuriously.
    pub action_failure_rate: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            version: "1.20.1".to_string(),
            refuse_attempts: 0,
            seed: 0,
            action_failure_rate: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct Presence {
    agents: HashMap<SessionId, (BlockPos, Dimension)>,
}

fn lock(presence: &Mutex<Presence>) -> MutexGuard<'_, Presence> {
    presence.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`GameClient`] backed by simulated worlds.
#[derive(Debug)]
pub struct SimulatedClient {
    options: SimOptions,
    attempts: AtomicUsize,
    presence: Arc<Mutex<Presence>>,
}

impl SimulatedClient {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            attempts: AtomicUsize::new(0),
            presence: Arc::new(Mutex::new(Presence::default())),
        }
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Sessions currently connected.
    pub fn online(&self) -> usize {
        lock(&self.presence).agents.len()
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new(SimOptions::default())
    }
}

#[async_trait]
impl GameClient for SimulatedClient {
    async fn connect(&self, request: ConnectRequest) -> Result<Connection, ClientError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.options.refuse_attempts {
            return Err(ClientError::refused(format!(
                "connect ECONNREFUSED {}:{}",
                request.host, request.port
            )));
        }

        let version = request
            .version_hint
            .clone()
            .unwrap_or_else(|| self.options.version.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let session = SimSession::new(
            request.identity,
            version,
            self.options.seed.wrapping_add(attempt as u64),
            self.options.action_failure_rate,
            Arc::clone(&self.presence),
            tx,
        );
        let _ = session.events.send(SessionEvent::Joined);
        debug!(agent = %session.identity, session = %session.id, "simulated session opened");

        Ok(Connection {
            session: Box::new(session),
            events: rx,
        })
    }
}

#[derive(Debug, Clone)]
struct SimEntity {
    id: u32,
    kind: EntityKind,
    position: BlockPos,
    health: f64,
    drop: Option<ItemKind>,
}

/// Pickaxe tier needed to dig `kind`, and what digging yields.
fn dig_yield(kind: ResourceKind) -> Option<(u8, ItemKind)> {
    match kind {
        ResourceKind::Wood => Some((0, ItemKind::Log)),
        ResourceKind::Stone => Some((1, ItemKind::Cobblestone)),
        ResourceKind::Coal => Some((1, ItemKind::Coal)),
        ResourceKind::IronOre => Some((2, ItemKind::IronOre)),
        ResourceKind::Diamond => Some((3, ItemKind::Diamond)),
        ResourceKind::Obsidian => Some((4, ItemKind::Obsidian)),
        _ => None,
    }
}

fn is_night(time_of_day: u32) -> bool {
    NIGHT.contains(&time_of_day)
}

fn is_threat(kind: EntityKind) -> bool {
    matches!(kind, EntityKind::Hostile | EntityKind::Dragon)
}

/// Moves `from` one block along each axis towards `to`.
fn approach(from: &mut BlockPos, to: &BlockPos) {
    if from.distance_to(to) <= 1.5 {
        return;
    }
    from.x += (to.x - from.x).signum();
    from.z += (to.z - from.z).signum();
}

struct SimSession {
    id: SessionId,
    identity: AgentIdentity,
    version: String,
    table: GameDataTable,
    rng: StdRng,
    world: WorldSnapshot,
    position: BlockPos,
    blocks: Vec<BlockRef>,
    entities: Vec<SimEntity>,
    next_entity: u32,
    frame_blocks: u32,
    failure_rate: f64,
    connected: bool,
    presence: Arc<Mutex<Presence>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SimSession {
    fn new(
        identity: AgentIdentity,
        version: String,
        seed: u64,
        failure_rate: f64,
        presence: Arc<Mutex<Presence>>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let position = BlockPos::new(rng.gen_range(-12..=12), 64, rng.gen_range(-12..=12));
        let mut session = Self {
            id: Uuid::new_v4(),
            identity,
            table: GameDataTable::for_version(&version),
            version,
            rng,
            world: WorldSnapshot::fresh(),
            position,
            blocks: Vec::new(),
            entities: Vec::new(),
            next_entity: 1,
            frame_blocks: 0,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            connected: true,
            presence,
            events,
        };
        session.populate();
        session.refresh();
        session
    }

    // ---- world generation ----

    fn offset(&mut self, min: i32, max: i32) -> BlockPos {
        let sign = if self.rng.gen_bool(0.5) { 1 } else { -1 };
        let dx = self.rng.gen_range(min..=max) * sign;
        let dz = self.rng.gen_range(-min..=min);
        BlockPos::new(self.position.x + dx, self.position.y, self.position.z + dz)
    }

    fn spawn_block(&mut self, kind: ResourceKind, min: i32, max: i32) {
        let names = self.table.block_names(kind);
        if names.is_empty() {
            return;
        }
        let name = names[self.rng.gen_range(0..names.len())].clone();
        let position = self.offset(min, max);
        self.blocks.push(BlockRef { name, position });
    }

    fn spawn_block_at(&mut self, kind: ResourceKind, position: BlockPos) {
        if let Some(name) = self.table.block_names(kind).first().cloned() {
            self.blocks.push(BlockRef { name, position });
        }
    }

    fn spawn_entity(&mut self, kind: EntityKind, min: i32, max: i32, health: f64, drop: Option<ItemKind>) {
        let position = self.offset(min, max);
        let id = self.next_entity;
        self.next_entity += 1;
        self.entities.push(SimEntity {
            id,
            kind,
            position,
            health,
            drop,
        });
    }

    fn hostile_drop(&mut self) -> Option<ItemKind> {
        match self.world.dimension {
            Dimension::Overworld | Dimension::End => {
                self.rng.gen_bool(0.3).then_some(ItemKind::EnderPearl)
            }
            Dimension::Nether => self.rng.gen_bool(0.5).then_some(ItemKind::BlazePowder),
        }
    }

    fn populate(&mut self) {
        self.blocks.clear();
        self.entities.clear();
        self.frame_blocks = 0;
        let arrival = BlockPos::new(self.position.x + 2, self.position.y, self.position.z);

        match self.world.dimension {
            Dimension::Overworld => {
                let layout = [
                    (ResourceKind::Wood, 6),
                    (ResourceKind::Stone, 6),
                    (ResourceKind::Coal, 3),
                    (ResourceKind::IronOre, 3),
                    (ResourceKind::Diamond, 1),
                    (ResourceKind::Lava, 1),
                    (ResourceKind::Obsidian, 2),
                    (ResourceKind::Bed, 1),
                ];
                for (kind, count) in layout {
                    for _ in 0..count {
                        self.spawn_block(kind, 3, 24);
                    }
                }
                self.spawn_block(ResourceKind::EndPortal, 80, 100);
                for _ in 0..2 {
                    self.spawn_entity(EntityKind::Animal, 4, 16, 10.0, Some(ItemKind::Food));
                }
                if self.world.portal_built {
                    self.spawn_block_at(ResourceKind::Portal, arrival);
                }
            }
            Dimension::Nether => {
                self.spawn_block_at(ResourceKind::Portal, arrival);
                for _ in 0..2 {
                    self.spawn_entity(EntityKind::Hostile, 8, 20, 20.0, Some(ItemKind::BlazePowder));
                }
            }
            Dimension::End => {
                self.spawn_entity(EntityKind::Dragon, 10, 30, DRAGON_HEALTH, None);
                self.spawn_entity(EntityKind::Hostile, 8, 20, 20.0, Some(ItemKind::EnderPearl));
            }
        }
    }

    fn travel(&mut self, to: Dimension) {
        debug!(agent = %self.identity, from = %self.world.dimension, to = %to, "changed dimension");
        self.world.dimension = to;
        self.populate();
    }

    // ---- time ----

    fn step(&mut self) {
        if self.world.dead {
            return;
        }
        self.world.time_of_day = (self.world.time_of_day + TICKS_PER_STEP) % DAY_LENGTH;

        self.world.food = (self.world.food - 0.05).max(0.0);
        if self.world.food <= 0.0 {
            self.world.health -= 0.5;
        } else if self.world.food >= 18.0 {
            self.world.health = (self.world.health + 0.25).min(20.0);
        }

        let night = is_night(self.world.time_of_day);
        let hostile_time = self.world.dimension != Dimension::Overworld || night;
        let hostiles = self.entities.iter().filter(|e| e.kind == EntityKind::Hostile).count();
        if hostile_time && hostiles < MAX_HOSTILES && self.rng.gen_bool(0.05) {
            let drop = self.hostile_drop();
            self.spawn_entity(EntityKind::Hostile, 10, 20, 20.0, drop);
        }
        if self.world.dimension == Dimension::Overworld {
            if !night {
                let rng = &mut self.rng;
                self.entities
                    .retain(|e| e.kind != EntityKind::Hostile || !rng.gen_bool(0.1));
            }
            let animals = self.entities.iter().filter(|e| e.kind == EntityKind::Animal).count();
            if animals < 2 && self.rng.gen_bool(0.02) {
                self.spawn_entity(EntityKind::Animal, 4, 16, 10.0, Some(ItemKind::Food));
            }
        }

        let me = self.position;
        let mut damage = 0.0;
        for entity in self.entities.iter_mut().filter(|e| is_threat(e.kind)) {
            approach(&mut entity.position, &me);
            if entity.position.distance_to(&me) <= 2.0 {
                damage += if entity.kind == EntityKind::Dragon { 3.0 } else { 1.0 };
            }
        }
        self.hurt(damage);
    }

    fn hurt(&mut self, damage: f64) {
        self.world.health -= damage;
        if self.world.health <= 0.0 {
            self.world.health = 0.0;
            self.world.dead = true;
            debug!(agent = %self.identity, "agent died");
        }
    }

    /// Recomputes derived distances and publishes this agent's position.
    fn refresh(&mut self) {
        let me = self.position;
        let (own_id, dimension) = (self.id, self.world.dimension);
        self.world.nearest_enemy = self
            .entities
            .iter()
            .filter(|e| is_threat(e.kind))
            .map(|e| e.position.distance_to(&me))
            .min_by(f64::total_cmp);

        let mut presence = lock(&self.presence);
        if self.connected {
            presence.agents.insert(own_id, (me, dimension));
        }
        self.world.nearest_ally = presence
            .agents
            .iter()
            .filter(|(id, (_, dim))| **id != own_id && *dim == dimension)
            .map(|(_, (pos, _))| pos.distance_to(&me))
            .min_by(f64::total_cmp);
    }

    // ---- inventory ----

    fn count(&self, item: ItemKind) -> u32 {
        self.world.count(item)
    }

    fn give(&mut self, item: ItemKind, n: u32) {
        *self.world.inventory.entry(item).or_insert(0) += n;
    }

    fn take(&mut self, item: ItemKind, n: u32) -> bool {
        match self.world.inventory.get_mut(&item) {
            Some(have) if *have >= n => {
                *have -= n;
                if *have == 0 {
                    self.world.inventory.remove(&item);
                }
                true
            }
            _ => false,
        }
    }

    fn pickaxe_tier(&self) -> u8 {
        [
            (ItemKind::DiamondPickaxe, 4),
            (ItemKind::IronPickaxe, 3),
            (ItemKind::StonePickaxe, 2),
            (ItemKind::WoodenPickaxe, 1),
        ]
        .into_iter()
        .find(|(tool, _)| self.count(*tool) > 0)
        .map_or(0, |(_, tier)| tier)
    }

    // ---- guards ----

    fn ensure_live(&self) -> Result<(), ClientError> {
        if !self.connected {
            return Err(ClientError::reset("session closed"));
        }
        if self.world.dead {
            return Err(ClientError::action("agent is dead"));
        }
        Ok(())
    }

    fn maybe_fail(&mut self, message: &str) -> Result<(), ClientError> {
        if self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate) {
            return Err(ClientError::action(message));
        }
        Ok(())
    }

    fn entity_index(&self, entity: &EntityRef) -> Result<usize, ClientError> {
        let index = self
            .entities
            .iter()
            .position(|e| e.id == entity.id)
            .ok_or_else(|| ClientError::action("target is gone"))?;
        if self.entities[index].position.distance_to(&self.position) > REACH {
            return Err(ClientError::action("target out of reach"));
        }
        Ok(index)
    }

    fn allies(&self) -> Vec<EntityRef> {
        let me = self.position;
        lock(&self.presence)
            .agents
            .iter()
            .filter(|(id, (_, dim))| **id != self.id && *dim == self.world.dimension)
            .enumerate()
            .map(|(i, (_, (pos, _)))| EntityRef {
                id: ALLY_ID_BASE + i as u32,
                kind: EntityKind::Ally,
                position: *pos,
                distance: pos.distance_to(&me),
            })
            .collect()
    }

    fn leave(&mut self) {
        if self.connected {
            self.connected = false;
            lock(&self.presence).agents.remove(&self.id);
        }
    }
}

impl Drop for SimSession {
    fn drop(&mut self) {
        self.leave();
    }
}

#[async_trait]
impl GameSession for SimSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    fn game_version(&self) -> String {
        self.version.clone()
    }

    fn position(&self) -> BlockPos {
        self.position
    }

    fn inventory_count(&self, item: ItemKind) -> u32 {
        self.count(item)
    }

    async fn snapshot(&mut self) -> Result<WorldSnapshot, ClientError> {
        if !self.connected {
            return Err(ClientError::reset("session closed"));
        }
        self.step();
        self.refresh();
        Ok(self.world.clone())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            self.leave();
            let _ = self.events.send(SessionEvent::Ended {
                reason: "disconnected".to_string(),
            });
        }
    }

    async fn send_chat(&mut self, text: &str) -> Result<(), ClientError> {
        if !self.connected {
            return Err(ClientError::reset("session closed"));
        }
        debug!(agent = %self.identity, text, "chat");
        Ok(())
    }

    async fn find_nearest_entity(&mut self, filter: &EntityFilter) -> Option<EntityRef> {
        if !self.connected {
            return None;
        }
        let me = self.position;
        self.entities
            .iter()
            .map(|e| EntityRef {
                id: e.id,
                kind: e.kind,
                position: e.position,
                distance: e.position.distance_to(&me),
            })
            .chain(self.allies())
            .filter(|e| filter.matches(e.kind, e.distance))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    async fn find_block(&mut self, criteria: &BlockCriteria) -> Option<BlockRef> {
        if !self.connected {
            return None;
        }
        let me = self.position;
        self.blocks
            .iter()
            .filter(|b| criteria.matches(&b.name, b.position.distance_to(&me)))
            .min_by(|a, b| {
                a.position
                    .distance_to(&me)
                    .total_cmp(&b.position.distance_to(&me))
            })
            .cloned()
    }

    async fn navigate_to(&mut self, goal: Goal) -> Result<(), ClientError> {
        self.ensure_live()?;
        self.maybe_fail("no path to goal")?;
        match goal {
            Goal::Near { position, range } => {
                self.position = if range >= 1.0 {
                    BlockPos::new(position.x + 1, position.y, position.z)
                } else {
                    position
                };
            }
            Goal::Away { position, distance } => {
                let sign = if self.position.x >= position.x { 1 } else { -1 };
                let x = position.x + sign * (distance.ceil() as i32 + 1);
                self.position = BlockPos::new(x, self.position.y, self.position.z);
            }
        }

        let on_portal = self
            .blocks
            .iter()
            .any(|b| b.position == self.position && self.table.classify(&b.name) == Some(ResourceKind::Portal));
        if on_portal {
            let to = match self.world.dimension {
                Dimension::Overworld => Dimension::Nether,
                _ => Dimension::Overworld,
            };
            self.travel(to);
        }
        self.refresh();
        Ok(())
    }

    async fn dig(&mut self, block: &BlockRef) -> Result<(), ClientError> {
        self.ensure_live()?;
        let index = self
            .blocks
            .iter()
            .position(|b| b == block)
            .ok_or_else(|| ClientError::action(format!("no {} at that position", block.name)))?;
        if block.position.distance_to(&self.position) > REACH {
            return Err(ClientError::action("block out of reach"));
        }
        let kind = self
            .table
            .classify(&block.name)
            .ok_or_else(|| ClientError::action(format!("cannot dig {}", block.name)))?;
        let (tier, item) =
            dig_yield(kind).ok_or_else(|| ClientError::action(format!("cannot dig {}", block.name)))?;
        if self.pickaxe_tier() < tier {
            return Err(ClientError::action(format!("{} needs a better pickaxe", block.name)));
        }
        self.maybe_fail("dig interrupted")?;

        self.blocks.swap_remove(index);
        self.give(item, 1);
        self.spawn_block(kind, 8, 24);
        Ok(())
    }

    async fn place(&mut self, item: ItemKind, near: BlockPos) -> Result<(), ClientError> {
        self.ensure_live()?;
        if !self.take(item, 1) {
            return Err(ClientError::action(format!("no {item} to place")));
        }
        if item == ItemKind::Obsidian {
            self.frame_blocks += 1;
        }
        self.blocks.push(BlockRef {
            name: item.name().to_string(),
            position: near,
        });
        Ok(())
    }

    async fn craft(&mut self, item: ItemKind, count: u32) -> Result<(), ClientError> {
        self.ensure_live()?;
        let recipe = self
            .table
            .recipe(item)
            .ok_or_else(|| ClientError::action(format!("no recipe for {item}")))?;
        for _ in 0..count.max(1) {
            let has_station = recipe.station.map_or(true, |s| self.count(s) > 0);
            let has_inputs = recipe.inputs.iter().all(|(input, n)| self.count(*input) >= *n);
            if !has_station || !has_inputs {
                return Err(ClientError::action(format!("missing ingredients for {item}")));
            }
            for (input, n) in recipe.inputs {
                self.take(*input, *n);
            }
            self.give(item, recipe.output);
        }
        Ok(())
    }

    async fn activate(&mut self, item: ItemKind, target: BlockPos) -> Result<(), ClientError> {
        self.ensure_live()?;
        match item {
            ItemKind::FlintAndSteel => {
                if self.count(ItemKind::FlintAndSteel) == 0 {
                    return Err(ClientError::action("no flint_and_steel"));
                }
                if self.frame_blocks < PORTAL_FRAME_SIZE {
                    return Err(ClientError::action("no complete portal frame"));
                }
                self.frame_blocks -= PORTAL_FRAME_SIZE;
                self.world.portal_built = true;
                self.spawn_block_at(ResourceKind::Portal, target);
                Ok(())
            }
            ItemKind::EyeOfEnder => {
                let is_end_portal = self.blocks.iter().any(|b| {
                    b.position == target && self.table.classify(&b.name) == Some(ResourceKind::EndPortal)
                });
                if !is_end_portal {
                    return Err(ClientError::action("no end portal there"));
                }
                if !self.take(ItemKind::EyeOfEnder, EYES_REQUIRED) {
                    return Err(ClientError::action("the end portal needs 12 eyes"));
                }
                self.travel(Dimension::End);
                self.refresh();
                Ok(())
            }
            other => Err(ClientError::action(format!("cannot activate {other}"))),
        }
    }

    async fn sleep(&mut self) -> Result<(), ClientError> {
        self.ensure_live()?;
        if self.world.dimension != Dimension::Overworld {
            return Err(ClientError::action("you can only sleep in the overworld"));
        }
        if !is_night(self.world.time_of_day) {
            return Err(ClientError::action("you can only sleep at night"));
        }
        if self.world.nearest_enemy.is_some_and(|d| d < 8.0) {
            return Err(ClientError::action("you may not rest now, there are monsters nearby"));
        }
        self.world.time_of_day = 0;
        Ok(())
    }

    async fn attack(&mut self, entity: &EntityRef) -> Result<(), ClientError> {
        self.ensure_live()?;
        let index = self.entity_index(entity)?;
        self.maybe_fail("missed")?;

        let damage = if self.count(ItemKind::Sword) > 0 { 7.0 } else { 2.0 };
        let target = &mut self.entities[index];
        target.health -= damage;
        let (kind, position, slain) = (target.kind, target.position, target.health <= 0.0);
        if kind == EntityKind::Hostile {
            self.hurt(1.0);
        }
        if slain {
            let dead = self.entities.swap_remove(index);
            if kind == EntityKind::Dragon {
                self.world.dragon_defeated = true;
            }
            if let Some(drop) = dead.drop {
                let id = self.next_entity;
                self.next_entity += 1;
                self.entities.push(SimEntity {
                    id,
                    kind: EntityKind::DroppedItem,
                    position,
                    health: 1.0,
                    drop: Some(drop),
                });
            }
        }
        self.refresh();
        Ok(())
    }

    async fn collect(&mut self, entity: &EntityRef) -> Result<(), ClientError> {
        self.ensure_live()?;
        let index = self.entity_index(entity)?;
        if self.entities[index].kind != EntityKind::DroppedItem {
            return Err(ClientError::action("not an item"));
        }
        let picked = self.entities.swap_remove(index);
        if let Some(item) = picked.drop {
            self.give(item, 1);
        }
        Ok(())
    }

    async fn consume(&mut self, item: ItemKind) -> Result<(), ClientError> {
        self.ensure_live()?;
        if item != ItemKind::Food {
            return Err(ClientError::action(format!("{item} is not edible")));
        }
        if !self.take(item, 1) {
            return Err(ClientError::action("nothing to eat"));
        }
        self.world.food = (self.world.food + 6.0).min(20.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> ConnectRequest {
        ConnectRequest {
            host: "localhost".to_string(),
            port: 25565,
            identity: AgentIdentity::new(name).unwrap(),
            version_hint: None,
        }
    }

    async fn session(name: &str) -> Box<dyn GameSession> {
        SimulatedClient::default()
            .connect(request(name))
            .await
            .unwrap()
            .session
    }

    #[tokio::test]
    async fn refuses_configured_number_of_attempts() {
        let client = SimulatedClient::new(SimOptions {
            refuse_attempts: 2,
            ..SimOptions::default()
        });
        for _ in 0..2 {
            let err = client.connect(request("Alpha")).await.err().unwrap();
            assert!(err.is_connection());
        }
        let mut conn = client.connect(request("Alpha")).await.unwrap();
        assert_eq!(conn.events.recv().await, Some(SessionEvent::Joined));
        assert_eq!(client.attempts(), 3);
        assert_eq!(client.online(), 1);
    }

    #[tokio::test]
    async fn disconnect_emits_ended_and_leaves() {
        let client = SimulatedClient::default();
        let mut conn = client.connect(request("Alpha")).await.unwrap();
        conn.session.disconnect().await;
        assert_eq!(conn.events.recv().await, Some(SessionEvent::Joined));
        assert!(matches!(conn.events.recv().await, Some(SessionEvent::Ended { .. })));
        assert_eq!(client.online(), 0);
        assert!(conn.session.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn digging_requires_the_right_tier() {
        let mut s = session("Miner").await;
        let names = GameDataTable::for_version("1.20.1");
        let stone = s
            .find_block(&BlockCriteria::new(names.block_names(ResourceKind::Stone), 64.0))
            .await
            .unwrap();
        s.navigate_to(Goal::Near {
            position: stone.position,
            range: 1.0,
        })
        .await
        .unwrap();
        let err = s.dig(&stone).await.unwrap_err();
        assert!(err.message.contains("better pickaxe"));
    }

    #[tokio::test]
    async fn wood_to_wooden_pickaxe() {
        let mut s = session("Crafter").await;
        let names = GameDataTable::for_version("1.20.1");
        let wood = BlockCriteria::new(names.block_names(ResourceKind::Wood), 64.0);
        for _ in 0..3 {
            let log = s.find_block(&wood).await.unwrap();
            s.navigate_to(Goal::Near {
                position: log.position,
                range: 1.0,
            })
            .await
            .unwrap();
            s.dig(&log).await.unwrap();
        }
        assert_eq!(s.inventory_count(ItemKind::Log), 3);

        s.craft(ItemKind::Planks, 3).await.unwrap();
        s.craft(ItemKind::CraftingTable, 1).await.unwrap();
        s.craft(ItemKind::Stick, 1).await.unwrap();
        assert!(s.craft(ItemKind::StonePickaxe, 1).await.is_err());
        s.craft(ItemKind::WoodenPickaxe, 1).await.unwrap();
        assert_eq!(s.inventory_count(ItemKind::WoodenPickaxe), 1);
    }

    #[tokio::test]
    async fn cannot_sleep_during_the_day() {
        let mut s = session("Sleeper").await;
        let err = s.sleep().await.unwrap_err();
        assert!(err.message.contains("night"));
    }

    #[tokio::test]
    async fn sessions_see_each_other_as_allies() {
        let client = SimulatedClient::default();
        let mut a = client.connect(request("Alpha")).await.unwrap().session;
        let mut b = client.connect(request("Bravo")).await.unwrap().session;
        b.snapshot().await.unwrap();
        let ally = a
            .find_nearest_entity(&EntityFilter::new([EntityKind::Ally], 1000.0))
            .await
            .unwrap();
        assert_eq!(ally.kind, EntityKind::Ally);
        assert!(a.snapshot().await.unwrap().nearest_ally.is_some());
    }

    #[tokio::test]
    async fn starving_agent_eventually_dies() {
        let mut s = session("Hungry").await;
        let mut snapshot = s.snapshot().await.unwrap();
        for _ in 0..5_000 {
            if snapshot.dead {
                break;
            }
            snapshot = s.snapshot().await.unwrap();
        }
        assert!(snapshot.dead);
        assert_eq!(snapshot.health, 0.0);
        assert!(s.craft(ItemKind::Planks, 1).await.is_err());
    }
}
