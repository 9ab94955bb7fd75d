//! Game-client capability interface.
//!
//! The protocol client is an external collaborator: the fleet only sees the
//! [`GameClient`] / [`GameSession`] traits below. [`sim::SimulatedClient`] is
//! an in-process implementation with a small deterministic world.

pub mod error;
pub mod game_data;
pub mod query;
pub mod sim;
pub mod world;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::identity::AgentIdentity;

pub use error::{ClientError, ErrorClass};
pub use game_data::{GameDataCell, GameDataTable, Recipe, ResourceKind};
pub use query::{BlockCriteria, BlockRef, EntityFilter, EntityKind, EntityRef, Goal};
pub use sim::{SimOptions, SimulatedClient};
pub use world::{BlockPos, Dimension, ItemKind, WorldSnapshot};

/// Identifier of one connected session.
pub type SessionId = Uuid;

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub identity: AgentIdentity,
    /// Protocol version to request; `None` lets the client negotiate.
    pub version_hint: Option<String>,
}

/// Asynchronous notifications from a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The agent spawned in the world.
    Joined,
    /// The session ended for a non-error reason.
    Ended { reason: String },
    /// The session failed.
    Faulted(ClientError),
    ChatReceived { sender: String, text: String },
}

/// An open session plus its event stream.
pub struct Connection {
    pub session: Box<dyn GameSession>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Opens sessions against a game server.
#[async_trait]
pub trait GameClient: Send + Sync {
    async fn connect(&self, request: ConnectRequest) -> Result<Connection, ClientError>;
}

/// World queries and actions available to one connected agent.
///
/// Every action may fail asynchronously with a [`ClientError`].
#[async_trait]
pub trait GameSession: Send {
    fn id(&self) -> SessionId;

    fn identity(&self) -> &AgentIdentity;

    /// Protocol version the server speaks, e.g. `"1.20.1"`.
    fn game_version(&self) -> String;

    fn position(&self) -> BlockPos;

    fn inventory_count(&self, item: ItemKind) -> u32;

    /// Reads the current world state.
    async fn snapshot(&mut self) -> Result<WorldSnapshot, ClientError>;

    async fn disconnect(&mut self);

    async fn send_chat(&mut self, text: &str) -> Result<(), ClientError>;

    async fn find_nearest_entity(&mut self, filter: &EntityFilter) -> Option<EntityRef>;

    async fn find_block(&mut self, criteria: &BlockCriteria) -> Option<BlockRef>;

    async fn navigate_to(&mut self, goal: Goal) -> Result<(), ClientError>;

    async fn dig(&mut self, block: &BlockRef) -> Result<(), ClientError>;

    async fn place(&mut self, item: ItemKind, near: BlockPos) -> Result<(), ClientError>;

    /// Crafts (or smelts) `count` batches of `item`.
    async fn craft(&mut self, item: ItemKind, count: u32) -> Result<(), ClientError>;

    /// Uses `item` on the block at `target` (lighting a portal, placing an eye).
    async fn activate(&mut self, item: ItemKind, target: BlockPos) -> Result<(), ClientError>;

    async fn sleep(&mut self) -> Result<(), ClientError>;

    async fn attack(&mut self, entity: &EntityRef) -> Result<(), ClientError>;

    async fn collect(&mut self, entity: &EntityRef) -> Result<(), ClientError>;

    async fn consume(&mut self, item: ItemKind) -> Result<(), ClientError>;
}
