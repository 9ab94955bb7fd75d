//! Per-agent learner: estimator, replay buffer and anti-stall exploration.

use tracing::info;

use super::approximator::{build_approximator, FunctionApproximator};
use super::buffer::{ExperienceReplayBuffer, Transition};
use super::config::LearningConfig;
use super::error::ApproximatorError;
use super::estimator::{QValueEstimator, TrainOutcome};
use super::observation::Observation;
use crate::actions::Action;

/// Estimator over boxed approximators, as used by the fleet.
pub type DynEstimator = QValueEstimator<Box<dyn FunctionApproximator>>;

/// Detects long runs without progress.
///
/// A tick counts as progress when its reward beats the survival bonus, i.e.
/// something beyond merely staying alive happened.
#[derive(Debug, Clone)]
pub struct StallDetector {
    limit: u64,
    baseline: f64,
    idle_ticks: u64,
}

impl StallDetector {
    pub fn new(limit: u64, baseline: f64) -> Self {
        Self {
            limit,
            baseline,
            idle_ticks: 0,
        }
    }

    /// Records one tick's reward; returns true when the stall limit is hit.
    pub fn observe(&mut self, reward: f64) -> bool {
        if reward > self.baseline + 1e-9 {
            self.idle_ticks = 0;
            return false;
        }
        self.idle_ticks += 1;
        if self.limit > 0 && self.idle_ticks >= self.limit {
            self.idle_ticks = 0;
            return true;
        }
        false
    }

    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }
}

/// Everything one agent learns with; survives reconnects within a process.
pub struct Brain {
    estimator: DynEstimator,
    buffer: ExperienceReplayBuffer,
    stall: StallDetector,
    stall_epsilon: f64,
}

impl Brain {
    /// Builds a fresh brain from the learning configuration.
    pub fn new(
        config: &LearningConfig,
        stall_ticks: u64,
        stall_epsilon: f64,
    ) -> Result<Self, ApproximatorError> {
        let live = build_approximator(config, 0)?;
        let target = build_approximator(config, 1)?;
        Ok(Self::with_estimator(
            QValueEstimator::new(live, target, config)?,
            config,
            stall_ticks,
            stall_epsilon,
        ))
    }

    /// Wraps an existing estimator.
    pub fn with_estimator(
        estimator: DynEstimator,
        config: &LearningConfig,
        stall_ticks: u64,
        stall_epsilon: f64,
    ) -> Self {
        Self {
            estimator,
            buffer: ExperienceReplayBuffer::new(config.replay_buffer_size),
            stall: StallDetector::new(stall_ticks, config.reward.survival_bonus),
            stall_epsilon,
        }
    }

    /// Chooses the next action for `observation`.
    pub fn decide(&mut self, observation: &Observation) -> Result<Action, ApproximatorError> {
        let id = self.estimator.select_action(&observation.to_vec())?;
        Ok(Action::from_id(id).unwrap_or(Action::Idle))
    }

    /// Stores a transition, trains once and applies the anti-stall boost.
    pub fn learn(&mut self, transition: Transition) -> Result<TrainOutcome, ApproximatorError> {
        let reward = transition.reward;
        self.buffer.push(transition);
        let outcome = self.estimator.train(&self.buffer)?;
        if self.stall.observe(reward) {
            self.estimator.boost_exploration(self.stall_epsilon);
            info!(epsilon = self.estimator.epsilon(), "no progress for a while, boosting exploration");
        }
        Ok(outcome)
    }

    pub fn estimator(&self) -> &DynEstimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut DynEstimator {
        &mut self.estimator
    }

    pub fn buffer(&self) -> &ExperienceReplayBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LearningConfig {
        LearningConfig {
            batch_size: 2,
            hidden_layers: vec![8],
            seed: Some(5),
            ..LearningConfig::default()
        }
    }

    fn step(reward: f64) -> Transition {
        Transition {
            state: vec![0.5; 25],
            action: 1,
            reward,
            next_state: vec![0.5; 25],
            terminal: false,
        }
    }

    #[test]
    fn stall_detector_fires_after_limit_and_resets() {
        let mut d = StallDetector::new(3, 0.1);
        assert!(!d.observe(0.1));
        assert!(!d.observe(0.1));
        assert!(d.observe(0.0));
        assert_eq!(d.idle_ticks(), 0);
        assert!(!d.observe(0.1));
        assert!(!d.observe(5.0));
        assert_eq!(d.idle_ticks(), 0);
    }

    #[test]
    fn decide_returns_valid_action() {
        let mut brain = Brain::new(&config(), 0, 0.5).unwrap();
        let obs = Observation::default();
        for _ in 0..100 {
            let action = brain.decide(&obs).unwrap();
            assert!(action.id() < crate::actions::ACTION_COUNT);
        }
    }

    #[test]
    fn learn_trains_once_buffer_fills() {
        let mut brain = Brain::new(&config(), 0, 0.5).unwrap();
        assert_eq!(brain.learn(step(1.0)).unwrap(), TrainOutcome::Skipped);
        assert!(brain.learn(step(1.0)).unwrap().trained());
        assert_eq!(brain.estimator().train_steps(), 1);
        assert_eq!(brain.buffer().len(), 2);
    }

    #[test]
    fn stalling_boosts_epsilon() {
        let cfg = LearningConfig {
            initial_epsilon: 0.9,
            epsilon_decay: 0.1,
            min_epsilon: 0.05,
            ..config()
        };
        let mut brain = Brain::new(&cfg, 4, 0.5).unwrap();
        for _ in 0..3 {
            brain.learn(step(0.0)).unwrap();
        }
        assert!(brain.estimator().epsilon() < 0.5);
        brain.learn(step(0.0)).unwrap();
        assert_eq!(brain.estimator().epsilon(), 0.5);
    }
}
