//! Q-value estimator with a live and a target approximator.
//!
//! Drives epsilon-greedy action selection and Bellman-target training from an
//! [`ExperienceReplayBuffer`]. The target approximator is a periodic snapshot
//! of the live one and is never more than `target_update_freq` training steps
//! stale.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::approximator::FunctionApproximator;
use super::buffer::ExperienceReplayBuffer;
use super::config::LearningConfig;
use super::error::ApproximatorError;
use crate::identity::AgentIdentity;
use crate::persistence::{run_blocking, Persistence};

/// Result of a call to [`QValueEstimator::train`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainOutcome {
    /// Not enough stored transitions for a batch; nothing changed.
    Skipped,
    /// One optimisation step was performed.
    Trained {
        /// Mean squared error of the batch before the step.
        loss: f64,
        /// Whether the target approximator was synced after this step.
        target_synced: bool,
    },
}

impl TrainOutcome {
    pub fn trained(&self) -> bool {
        matches!(self, TrainOutcome::Trained { .. })
    }
}

/// Bellman backup for one transition.
///
/// Terminal transitions bootstrap nothing: the target is the reward itself.
pub fn bellman_target(reward: f64, terminal: bool, discount: f64, next_max_q: f64) -> f64 {
    if terminal {
        reward
    } else {
        reward + discount * next_max_q
    }
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Action-value estimator with target-network stabilisation.
pub struct QValueEstimator<A: FunctionApproximator> {
    live: A,
    target: A,
    discount_factor: f64,
    batch_size: usize,
    target_update_freq: u64,
    initial_epsilon: f64,
    epsilon_decay: f64,
    min_epsilon: f64,
    epsilon: f64,
    train_steps: u64,
    rng: StdRng,
}

impl<A: FunctionApproximator> QValueEstimator<A> {
    /// Creates an estimator and syncs `target` from `live`.
    ///
    /// # Errors
    ///
    /// Fails if the two approximators do not share an architecture.
    pub fn new(live: A, mut target: A, config: &LearningConfig) -> Result<Self, ApproximatorError> {
        target.set_weights(&live.weights()?)?;
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            live,
            target,
            discount_factor: config.discount_factor,
            batch_size: config.batch_size,
            target_update_freq: config.target_update_freq.max(1),
            initial_epsilon: config.initial_epsilon,
            epsilon_decay: config.epsilon_decay,
            min_epsilon: config.min_epsilon,
            epsilon: config.initial_epsilon,
            train_steps: 0,
            rng,
        })
    }

    /// Epsilon-greedy selection: a uniformly random action with probability
    /// `epsilon`, otherwise the live approximator's argmax.
    pub fn select_action(&mut self, state: &[f64]) -> Result<usize, ApproximatorError> {
        if self.rng.gen::<f64>() < self.epsilon {
            return Ok(self.rng.gen_range(0..self.live.output_dim()));
        }
        self.greedy_action(state)
    }

    /// The live approximator's best action for `state`.
    pub fn greedy_action(&self, state: &[f64]) -> Result<usize, ApproximatorError> {
        let q = self.live.predict(&[state.to_vec()])?;
        Ok(q.first().map_or(0, |row| argmax(row)))
    }

    /// Performs one training step from `buffer`, if it holds a full batch.
    ///
    /// Each sampled state is fitted toward the live network's own current
    /// prediction with only the taken action's component replaced by its
    /// Bellman target, so the update flows through that action alone.
    pub fn train(&mut self, buffer: &ExperienceReplayBuffer) -> Result<TrainOutcome, ApproximatorError> {
        if buffer.len() < self.batch_size || self.batch_size == 0 {
            return Ok(TrainOutcome::Skipped);
        }
        let Some(batch) = buffer.sample_batch(self.batch_size, &mut self.rng) else {
            return Ok(TrainOutcome::Skipped);
        };

        let states: Vec<Vec<f64>> = batch.iter().map(|t| t.state.clone()).collect();
        let next_states: Vec<Vec<f64>> = batch.iter().map(|t| t.next_state.clone()).collect();

        let mut targets = self.live.predict(&states)?;
        let next_q = self.target.predict(&next_states)?;

        for ((row, transition), next) in targets.iter_mut().zip(&batch).zip(&next_q) {
            let next_max = next.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let next_max = if next_max.is_finite() { next_max } else { 0.0 };
            if let Some(slot) = row.get_mut(transition.action) {
                *slot = bellman_target(
                    transition.reward,
                    transition.terminal,
                    self.discount_factor,
                    next_max,
                );
            }
        }

        let loss = self.live.fit(&states, &targets)?;
        self.train_steps += 1;

        let target_synced = self.train_steps % self.target_update_freq == 0;
        if target_synced {
            self.sync_target()?;
            debug!(steps = self.train_steps, "target network synced");
        }

        self.epsilon = (self.epsilon * self.epsilon_decay).max(self.min_epsilon);

        Ok(TrainOutcome::Trained {
            loss,
            target_synced,
        })
    }

    /// Copies the live weights into the target approximator.
    pub fn sync_target(&mut self) -> Result<(), ApproximatorError> {
        let weights = self.live.weights()?;
        self.target.set_weights(&weights)
    }

    /// Raises epsilon to `level` (capped at the initial epsilon). This is the
    /// only operation that increases exploration.
    pub fn boost_exploration(&mut self, level: f64) {
        let level = level.clamp(self.min_epsilon, self.initial_epsilon.max(self.min_epsilon));
        if level > self.epsilon {
            self.epsilon = level;
        }
    }

    /// Snapshots the live weights now and returns a future that saves them
    /// under `identity` on the blocking pool. Failures are logged, never fatal.
    ///
    /// The future borrows nothing from the estimator, so training can go on
    /// while it runs.
    pub fn persist(&self, identity: &AgentIdentity, store: &Arc<dyn Persistence>) -> BoxFuture<'static, ()> {
        let snapshot = self.live.weights();
        let identity = identity.clone();
        let store = Arc::clone(store);
        async move {
            let weights = match snapshot {
                Ok(weights) => weights,
                Err(e) => {
                    warn!(agent = %identity, error = %e, "cannot read model weights, not saved");
                    return;
                }
            };
            let owner = identity.clone();
            match run_blocking(store, move |s| s.save_model_weights(&owner, &weights)).await {
                Ok(()) => debug!(agent = %identity, "model weights saved"),
                Err(e) => warn!(agent = %identity, error = %e, "failed to save model weights"),
            }
        }
        .boxed()
    }

    /// Loads live weights for `identity`, copies them into the target and
    /// drops epsilon to its floor.
    ///
    /// Returns `false` (fresh start) when nothing is stored or loading fails.
    pub fn restore(&mut self, identity: &AgentIdentity, store: &dyn Persistence) -> bool {
        let weights = match store.load_model_weights(identity) {
            Ok(Some(w)) => w,
            Ok(None) => {
                debug!(agent = %identity, "no saved model, starting fresh");
                return false;
            }
            Err(e) => {
                warn!(agent = %identity, error = %e, "failed to load model weights, starting fresh");
                return false;
            }
        };

        if let Err(e) = self.live.set_weights(&weights).and_then(|_| self.sync_target()) {
            warn!(agent = %identity, error = %e, "saved model is incompatible, starting fresh");
            return false;
        }
        self.epsilon = self.min_epsilon;
        info!(agent = %identity, params = weights.parameter_count(), "restored model weights");
        true
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of completed training steps.
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    pub fn live(&self) -> &A {
        &self.live
    }

    pub fn target(&self) -> &A {
        &self.target
    }

    pub fn action_count(&self) -> usize {
        self.live.output_dim()
    }
}
