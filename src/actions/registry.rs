use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use super::{handlers, Action, ActionError};
use crate::client::{GameDataTable, GameSession};
use crate::rl::Observation;

/// What a handler gets to work with for one action.
pub struct ActionContext<'a> {
    pub session: &'a mut dyn GameSession,
    pub game_data: &'a GameDataTable,
    /// Observation the action was chosen from.
    pub observation: &'a Observation,
}

/// Performs one [`Action`] through the session's capabilities.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError>;
}

/// Result of dispatching an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Succeeded,
    /// The world said no: path blocked, missing material, nothing in range.
    Failed(ActionError),
    /// Something broke inside the client or the dispatch table.
    Faulted(ActionError),
}

impl ActionOutcome {
    pub fn from_result(result: Result<(), ActionError>) -> Self {
        match result {
            Ok(()) => ActionOutcome::Succeeded,
            Err(e) if e.is_fault() => ActionOutcome::Faulted(e),
            Err(e) => ActionOutcome::Failed(e),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded)
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, ActionOutcome::Faulted(_))
    }

    pub fn error(&self) -> Option<&ActionError> {
        match self {
            ActionOutcome::Succeeded => None,
            ActionOutcome::Failed(e) | ActionOutcome::Faulted(e) => Some(e),
        }
    }
}

/// Dispatch table from [`Action`] to its handler.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<Action, Box<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a handler for every action.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        handlers::register_all(&mut registry);
        registry
    }

    /// Registers `handler` for `action`, returning the one it replaces.
    pub fn register(
        &mut self,
        action: Action,
        handler: impl ActionHandler + 'static,
    ) -> Option<Box<dyn ActionHandler>> {
        self.handlers.insert(action, Box::new(handler))
    }

    pub fn contains(&self, action: Action) -> bool {
        self.handlers.contains_key(&action)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler for `action`.
    ///
    /// Never returns an error: failures come back as [`ActionOutcome::Failed`]
    /// and bugs as [`ActionOutcome::Faulted`], including a handler that panics.
    pub async fn dispatch(&self, action: Action, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        let Some(handler) = self.handlers.get(&action) else {
            warn!(%action, "no handler registered");
            return ActionOutcome::Faulted(ActionError::Unregistered(action));
        };

        let result = match AssertUnwindSafe(handler.perform(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(ActionError::Panicked {
                action,
                message: panic_message(payload.as_ref()),
            }),
        };
        let outcome = ActionOutcome::from_result(result);
        match &outcome {
            ActionOutcome::Succeeded => debug!(%action, "action succeeded"),
            ActionOutcome::Failed(e) => debug!(%action, error = %e, "action failed"),
            ActionOutcome::Faulted(e) => warn!(%action, error = %e, "action faulted"),
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
