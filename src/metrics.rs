//! Episode and fleet counters.

use std::fmt;

use crate::actions::ActionOutcome;
use crate::lifecycle::AgentExit;

/// Counters for one learning episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeStats {
    pub ticks: u64,
    pub total_reward: f64,
    pub successes: u64,
    pub failures: u64,
    pub faults: u64,
    pub train_steps: u64,
    pub final_epsilon: f64,
}

impl EpisodeStats {
    pub fn record(&mut self, reward: f64, outcome: &ActionOutcome, trained: bool) {
        self.ticks += 1;
        self.total_reward += reward;
        match outcome {
            ActionOutcome::Succeeded => self.successes += 1,
            ActionOutcome::Failed(_) => self.failures += 1,
            ActionOutcome::Faulted(_) => self.faults += 1,
        }
        if trained {
            self.train_steps += 1;
        }
    }

    pub fn mean_reward(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.total_reward / self.ticks as f64
        }
    }
}

impl fmt::Display for EpisodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} reward={:.2} mean={:.3} ok={} failed={} faulted={} trained={} epsilon={:.3}",
            self.ticks,
            self.total_reward,
            self.mean_reward(),
            self.successes,
            self.failures,
            self.faults,
            self.train_steps,
            self.final_epsilon
        )
    }
}

/// Fleet-wide counters returned by [`FleetManager::run`](crate::fleet::FleetManager::run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetStats {
    pub connect_attempts: u64,
    pub joins: u64,
    pub global_failures: u64,
    pub expiries: u64,
    pub deaths: u64,
    pub ends: u64,
    pub shutdowns: u64,
    /// Wake-ups that found their slot still occupied.
    pub occupied_wakes: u64,
    /// Wake-ups whose spawn failed and were retried after the cooldown.
    pub spawn_failures: u64,
    /// Agent tasks that panicked instead of reporting an exit.
    pub crashes: u64,
    pub peak_active: usize,
}

impl FleetStats {
    pub fn record_exit(&mut self, exit: &AgentExit) {
        match exit {
            AgentExit::Expired => self.expiries += 1,
            AgentExit::Failed(_) => self.global_failures += 1,
            AgentExit::Ended(_) => self.ends += 1,
            AgentExit::Died => self.deaths += 1,
            AgentExit::Shutdown => self.shutdowns += 1,
        }
    }
}

impl fmt::Display for FleetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts={} joins={} failures={} expired={} died={} ended={} shutdown={} spawn_failures={} crashes={} peak_active={}",
            self.connect_attempts,
            self.joins,
            self.global_failures,
            self.expiries,
            self.deaths,
            self.ends,
            self.shutdowns,
            self.spawn_failures,
            self.crashes,
            self.peak_active
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionError;
    use crate::client::ErrorClass;

    #[test]
    fn episode_counts_outcomes() {
        let mut stats = EpisodeStats::default();
        stats.record(1.0, &ActionOutcome::Succeeded, false);
        stats.record(-1.0, &ActionOutcome::Failed(ActionError::NotFound("enemy".into())), true);
        stats.record(-10.0, &ActionOutcome::Faulted(ActionError::Unregistered(crate::actions::Action::Idle)), true);
        assert_eq!(stats.ticks, 3);
        assert_eq!((stats.successes, stats.failures, stats.faults), (1, 1, 1));
        assert_eq!(stats.train_steps, 2);
        assert!((stats.mean_reward() + 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_episode_has_zero_mean() {
        assert_eq!(EpisodeStats::default().mean_reward(), 0.0);
    }

    #[test]
    fn fleet_counts_exits() {
        let mut stats = FleetStats::default();
        stats.record_exit(&AgentExit::Failed(ErrorClass::ConnectionRefused));
        stats.record_exit(&AgentExit::Died);
        stats.record_exit(&AgentExit::Expired);
        assert_eq!(stats.global_failures, 1);
        assert_eq!(stats.deaths, 1);
        assert_eq!(stats.expiries, 1);
        assert!(stats.to_string().starts_with("attempts=0 joins=0 failures=1"));
    }
}
