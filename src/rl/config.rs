//! Hyperparameters for the Q-learning agent core and its reward shaping.

use serde::{Deserialize, Serialize};

use super::observation::OBSERVATION_DIM;
use crate::actions::ACTION_COUNT;

/// Which function approximator backs the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproximatorKind {
    /// Pure-Rust multi-layer perceptron.
    Mlp,
    /// libtorch-backed network (requires the `rl-nn` feature).
    Torch,
}

/// Configuration for the Q-value estimator and replay buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    // --- Optimisation ---
    /// Step size of a single optimisation step.
    pub learning_rate: f64,
    /// Discount factor γ for the Bellman backup.
    pub discount_factor: f64,

    // --- Exploration ---
    /// Exploration probability of a fresh agent.
    pub initial_epsilon: f64,
    /// Multiplicative decay applied after every training step.
    pub epsilon_decay: f64,
    /// Floor for epsilon.
    pub min_epsilon: f64,

    // --- Replay ---
    /// Maximum number of stored transitions.
    pub replay_buffer_size: usize,
    /// Transitions per training step.
    pub batch_size: usize,
    /// Training steps between target-network syncs.
    pub target_update_freq: u64,

    // --- Network ---
    /// Hidden layer widths of the approximator.
    pub hidden_layers: Vec<usize>,
    pub approximator: ApproximatorKind,
    /// Seed for initialisation and exploration. `None` draws from entropy.
    pub seed: Option<u64>,

    /// Reward shaping weights.
    pub reward: RewardWeights,
}

impl LearningConfig {
    /// Input width of the approximator.
    pub fn input_dim(&self) -> usize {
        OBSERVATION_DIM
    }

    /// Output width of the approximator: one Q-value per action.
    pub fn output_dim(&self) -> usize {
        ACTION_COUNT
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            discount_factor: 0.95,
            initial_epsilon: 1.0,
            epsilon_decay: 0.995,
            min_epsilon: 0.05,
            replay_buffer_size: 10_000,
            batch_size: 32,
            target_update_freq: 100,
            hidden_layers: vec![64, 64],
            approximator: ApproximatorKind::Mlp,
            seed: None,
            reward: RewardWeights::default(),
        }
    }
}

/// Weights of the additive reward-shaping terms.
///
/// Resource weights apply per unit of the *normalised* count delta, so a
/// weight of 64 on a component normalised by 64 is one point per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    pub survival_bonus: f64,

    // --- Vitals (per health/food point) ---
    pub health_gain: f64,
    pub health_loss: f64,
    /// Loss weight once health is below `low_vital_threshold`.
    pub health_loss_critical: f64,
    pub food_gain: f64,
    pub food_loss: f64,
    pub food_loss_critical: f64,
    /// Normalised level below which vital losses use the critical weight.
    pub low_vital_threshold: f64,

    pub death_penalty: f64,

    // --- Threats ---
    pub enemy_cleared: f64,
    pub enemy_appeared: f64,
    pub enemy_closer: f64,

    // --- Resources, by tier ---
    pub wood: f64,
    pub stone: f64,
    pub coal: f64,
    pub iron_ore: f64,
    pub iron_ingot: f64,
    pub obsidian: f64,
    pub eye_of_ender: f64,

    // --- Milestones, by tier ---
    pub wooden_pickaxe: f64,
    pub stone_pickaxe: f64,
    pub iron_pickaxe: f64,
    pub diamond_pickaxe: f64,
    pub portal_built: f64,
    pub entered_nether: f64,
    pub entered_end: f64,
    pub dragon_defeated: f64,

    pub ally_arrived: f64,
    pub action_failed: f64,
    /// Fixed reward for an action that faulted at the dispatch boundary.
    pub action_faulted: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            survival_bonus: 0.1,
            health_gain: 0.5,
            health_loss: 2.0,
            health_loss_critical: 8.0,
            food_gain: 0.3,
            food_loss: 0.5,
            food_loss_critical: 2.0,
            low_vital_threshold: 0.3,
            death_penalty: -100.0,
            enemy_cleared: 5.0,
            enemy_appeared: -5.0,
            enemy_closer: -1.0,
            wood: 64.0,
            stone: 96.0,
            coal: 128.0,
            iron_ore: 192.0,
            iron_ingot: 256.0,
            obsidian: 640.0,
            eye_of_ender: 600.0,
            wooden_pickaxe: 10.0,
            stone_pickaxe: 20.0,
            iron_pickaxe: 50.0,
            diamond_pickaxe: 100.0,
            portal_built: 200.0,
            entered_nether: 500.0,
            entered_end: 1_000.0,
            dragon_defeated: 100_000.0,
            ally_arrived: 1.0,
            action_failed: -1.0,
            action_faulted: -10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_dimensions() {
        let cfg = LearningConfig::default();
        assert_eq!(cfg.input_dim(), 25);
        assert_eq!(cfg.output_dim(), 23);
    }

    #[test]
    fn milestone_weights_increase_by_tier() {
        let w = RewardWeights::default();
        let tiers = [
            w.wooden_pickaxe,
            w.stone_pickaxe,
            w.iron_pickaxe,
            w.diamond_pickaxe,
            w.portal_built,
            w.entered_nether,
            w.entered_end,
            w.dragon_defeated,
        ];
        assert!(tiers.windows(2).all(|p| p[0] < p[1]));
        assert!(w.dragon_defeated >= 100.0 * w.entered_nether);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: LearningConfig = serde_json::from_str(r#"{"batch_size": 8}"#).unwrap();
        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.target_update_freq, 100);
        assert_eq!(cfg.approximator, ApproximatorKind::Mlp);
    }
}
