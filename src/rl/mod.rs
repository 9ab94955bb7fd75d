//! Q-learning agent core.
//!
//! Observation encoding, reward shaping, experience replay and the
//! live/target Q-value estimator. The libtorch-backed approximator requires
//! the `rl-nn` feature; everything else is always available.

pub mod approximator;
pub mod brain;
pub mod buffer;
pub mod config;
pub mod error;
pub mod estimator;
pub mod observation;
pub mod reward;

#[cfg(feature = "rl-nn")]
pub mod network;

pub use approximator::{build_approximator, FunctionApproximator, MlpApproximator, Weights};
pub use brain::{Brain, DynEstimator, StallDetector};
pub use buffer::{ExperienceReplayBuffer, Transition};
pub use config::{ApproximatorKind, LearningConfig, RewardWeights};
pub use error::ApproximatorError;
pub use estimator::{QValueEstimator, TrainOutcome};
pub use observation::{Milestones, Observation, OBSERVATION_DIM};
pub use reward::RewardShaper;

#[cfg(feature = "rl-nn")]
pub use network::TorchApproximator;
