//! Agent lifecycle: the per-slot state machine and the task that drives one
//! agent from connection to exit.

pub mod agent;
pub mod error;
pub mod state;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use agent::{Agent, AgentExitReport, AgentReport, AgentRuntime};
pub use error::LifecycleError;
pub use state::{LifecycleState, Trigger};

use crate::client::{ClientError, ErrorClass, SessionEvent};

/// Which variant of the agent loop runs once a session is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Stay connected for a fixed lifetime, no decisions.
    Timed,
    /// Run the Q-learning decision loop every tick.
    #[default]
    Learning,
}

/// Per-agent behaviour settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub mode: AgentMode,
    /// Decision tick period in learning mode.
    pub tick_interval_ms: u64,
    /// Ticks without progress before exploration is boosted; 0 disables.
    pub stall_ticks: u64,
    /// Epsilon the anti-stall boost raises exploration to.
    pub stall_epsilon: f64,
    /// How long to wait for the join confirmation.
    pub join_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::Learning,
            tick_interval_ms: 1000,
            stall_ticks: 300,
            stall_epsilon: 0.3,
            join_timeout_secs: 30,
        }
    }
}

/// Why an agent's session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentExit {
    /// The lifetime timer fired.
    Expired,
    /// A connection-class error; triggers the global backoff.
    Failed(ErrorClass),
    /// The session ended for any other reason.
    Ended(String),
    /// Health reached zero.
    Died,
    /// The fleet is shutting down.
    Shutdown,
}

impl AgentExit {
    pub fn from_client_error(error: &ClientError) -> Self {
        if error.is_connection() {
            AgentExit::Failed(error.class)
        } else {
            AgentExit::Ended(error.to_string())
        }
    }

    /// Exit implied by a session event; `None` for events that do not end
    /// the session.
    pub fn from_session_event(event: SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::Ended { reason } => Some(AgentExit::Ended(reason)),
            SessionEvent::Faulted(e) => Some(AgentExit::from_client_error(&e)),
            SessionEvent::Joined | SessionEvent::ChatReceived { .. } => None,
        }
    }

    /// The lifecycle trigger this exit corresponds to.
    pub fn trigger(&self) -> Trigger {
        match self {
            AgentExit::Expired => Trigger::LifetimeElapsed,
            AgentExit::Failed(class) => Trigger::ConnectionLost(*class),
            AgentExit::Ended(_) => Trigger::SessionEnded,
            AgentExit::Died => Trigger::Died,
            AgentExit::Shutdown => Trigger::Shutdown,
        }
    }
}

impl fmt::Display for AgentExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentExit::Expired => write!(f, "expired"),
            AgentExit::Failed(class) => write!(f, "failed ({class})"),
            AgentExit::Ended(reason) => write!(f, "ended: {reason}"),
            AgentExit::Died => write!(f, "died"),
            AgentExit::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_and_reset_fail() {
        let e = ClientError::refused("ECONNREFUSED");
        assert_eq!(
            AgentExit::from_client_error(&e),
            AgentExit::Failed(ErrorClass::ConnectionRefused)
        );
        let e = ClientError::new(ErrorClass::Kicked, "You logged in from another location");
        assert!(matches!(AgentExit::from_client_error(&e), AgentExit::Ended(_)));
    }

    #[test]
    fn session_events_map_to_exits() {
        assert_eq!(AgentExit::from_session_event(SessionEvent::Joined), None);
        assert_eq!(
            AgentExit::from_session_event(SessionEvent::Ended {
                reason: "server closed".into()
            }),
            Some(AgentExit::Ended("server closed".into()))
        );
        assert_eq!(
            AgentExit::from_session_event(SessionEvent::Faulted(ClientError::reset("ECONNRESET"))),
            Some(AgentExit::Failed(ErrorClass::ConnectionReset))
        );
    }

    #[test]
    fn exit_trigger_lands_in_matching_state() {
        let active = LifecycleState::Active;
        assert_eq!(active.on(AgentExit::Expired.trigger()).unwrap(), LifecycleState::Expired);
        assert_eq!(
            active
                .on(AgentExit::Failed(ErrorClass::ConnectionReset).trigger())
                .unwrap(),
            LifecycleState::Failed
        );
        assert_eq!(active.on(AgentExit::Died.trigger()).unwrap(), LifecycleState::Ended);
    }

    #[test]
    fn agent_config_reads_partial_json() {
        let cfg: AgentConfig = serde_json::from_str(r#"{"mode":"timed"}"#).unwrap();
        assert_eq!(cfg.mode, AgentMode::Timed);
        assert_eq!(cfg.tick_interval_ms, 1000);
    }
}
