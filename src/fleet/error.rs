use thiserror::Error;

use crate::config::ConfigError;
use crate::identity::IdentityError;
use crate::persistence::PersistenceError;
use crate::rl::ApproximatorError;
use crate::scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Cannot build learner: {0}")]
    Learning(#[from] ApproximatorError),
}
