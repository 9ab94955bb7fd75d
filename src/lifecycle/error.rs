use thiserror::Error;

use super::state::{LifecycleState, Trigger};
use crate::client::ClientError;
use crate::rl::ApproximatorError;

/// Errors that end an agent's session.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid lifecycle transition from {from} on {trigger:?}")]
    InvalidTransition { from: LifecycleState, trigger: Trigger },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Learning failed: {0}")]
    Learning(#[from] ApproximatorError),
}
