//! Per-slot agent state machine.
//!
//! ```text
//! Disconnected ──wake──▶ Connecting ──joined──▶ Active ──lifetime──▶ Expired
//!                            │                    │
//!                            └──connection lost───┴──▶ Failed
//!                            └──ended/died/shutdown───▶ Ended
//! Expired | Failed | Ended ──reset──▶ Disconnected
//! ```

use std::fmt;

use super::error::LifecycleError;
use crate::client::ErrorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Disconnected,
    Connecting,
    Active,
    Expired,
    Failed,
    Ended,
}

impl LifecycleState {
    /// Expired, Failed and Ended wait only for a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Expired | LifecycleState::Failed | LifecycleState::Ended
        )
    }

    /// Applies `trigger`, or reports that it is not valid here.
    pub fn on(self, trigger: Trigger) -> Result<LifecycleState, LifecycleError> {
        use LifecycleState::*;
        let next = match (self, trigger) {
            (Disconnected, Trigger::Wake) => Connecting,
            (Connecting, Trigger::Joined) => Active,
            (Active, Trigger::LifetimeElapsed) => Expired,
            (Connecting | Active, Trigger::ConnectionLost(class)) if class.is_connection() => Failed,
            (Connecting | Active, Trigger::ConnectionLost(_)) => Ended,
            (Connecting | Active, Trigger::SessionEnded | Trigger::Died | Trigger::Shutdown) => Ended,
            (Expired | Failed | Ended, Trigger::Reset) => Disconnected,
            (from, trigger) => return Err(LifecycleError::InvalidTransition { from, trigger }),
        };
        Ok(next)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Disconnected => "disconnected",
            LifecycleState::Connecting => "connecting",
            LifecycleState::Active => "active",
            LifecycleState::Expired => "expired",
            LifecycleState::Failed => "failed",
            LifecycleState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Something that happened to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The slot's timer fired on an empty slot.
    Wake,
    Joined,
    LifetimeElapsed,
    /// The client reported an error of this class.
    ConnectionLost(ErrorClass),
    SessionEnded,
    Died,
    Shutdown,
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn happy_path_to_expiry() {
        let s = Disconnected.on(Trigger::Wake).unwrap();
        let s = s.on(Trigger::Joined).unwrap();
        let s = s.on(Trigger::LifetimeElapsed).unwrap();
        assert_eq!(s, Expired);
        assert_eq!(s.on(Trigger::Reset).unwrap(), Disconnected);
    }

    #[test]
    fn connection_errors_fail_from_connecting_and_active() {
        let refused = Trigger::ConnectionLost(ErrorClass::ConnectionRefused);
        assert_eq!(Connecting.on(refused).unwrap(), Failed);
        let reset = Trigger::ConnectionLost(ErrorClass::ConnectionReset);
        assert_eq!(Active.on(reset).unwrap(), Failed);
    }

    #[test]
    fn other_errors_end_the_session() {
        let kicked = Trigger::ConnectionLost(ErrorClass::Kicked);
        assert_eq!(Active.on(kicked).unwrap(), Ended);
        assert_eq!(Active.on(Trigger::Died).unwrap(), Ended);
        assert_eq!(Connecting.on(Trigger::Shutdown).unwrap(), Ended);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert!(Disconnected.on(Trigger::Joined).is_err());
        assert!(Connecting.on(Trigger::LifetimeElapsed).is_err());
        assert!(Active.on(Trigger::Wake).is_err());
        assert!(Expired.on(Trigger::Joined).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(Expired.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Ended.is_terminal());
        assert!(!Active.is_terminal());
    }
}
