//! craftfleet - a fleet of autonomous game-world agents.
//!
//! A slot scheduler staggers up to twenty agent connections, backs the whole
//! fleet off when the server refuses connections, and rotates agents on a
//! fixed lifetime. In learning mode every agent runs a Q-learning decision
//! loop (experience replay, target network, epsilon-greedy exploration) whose
//! weights persist across restarts.

pub mod actions;
pub mod client;
pub mod config;
pub mod fleet;
pub mod identity;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod rl;
pub mod scheduler;
pub mod units;

pub use config::FleetConfig;
pub use fleet::{FleetError, FleetManager};
pub use identity::AgentIdentity;
pub use metrics::FleetStats;

// Re-export unit conversion helpers for ergonomic use
pub use units::{convert, to_duration, SameDim};
