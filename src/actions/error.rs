use thiserror::Error;

use super::Action;
use crate::client::{ClientError, ErrorClass, ItemKind};

/// Why an action could not be carried out.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("No {0} in range")]
    NotFound(String),

    #[error("Missing {count} {item}")]
    Missing { item: ItemKind, count: u32 },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("No handler registered for {0}")]
    Unregistered(Action),

    #[error("Handler for {action} panicked: {message}")]
    Panicked { action: Action, message: String },
}

impl ActionError {
    /// Faults are bugs rather than game outcomes and get the severe penalty.
    pub fn is_fault(&self) -> bool {
        match self {
            ActionError::Client(e) => e.class == ErrorClass::Internal,
            ActionError::Unregistered(_) | ActionError::Panicked { .. } => true,
            _ => false,
        }
    }

    /// Class of the underlying client error, if any.
    pub fn client_class(&self) -> Option<ErrorClass> {
        match self {
            ActionError::Client(e) => Some(e.class),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_client_errors_are_faults() {
        assert!(ActionError::from(ClientError::internal("null entity")).is_fault());
        assert!(!ActionError::from(ClientError::action("no path")).is_fault());
        assert!(ActionError::Unregistered(Action::Idle).is_fault());
        assert!(ActionError::Panicked {
            action: Action::Eat,
            message: "index out of bounds".into()
        }
        .is_fault());
        assert!(!ActionError::NotFound("oak_log".into()).is_fault());
    }

    #[test]
    fn missing_display() {
        let e = ActionError::Missing {
            item: ItemKind::Obsidian,
            count: 4,
        };
        assert_eq!(e.to_string(), "Missing 4 obsidian");
    }
}
