use std::fmt;

use thiserror::Error;

/// Coarse classification of a game-client failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The server refused the TCP connection.
    ConnectionRefused,
    /// The server reset an established connection.
    ConnectionReset,
    /// An operation did not complete in time.
    Timeout,
    /// A world action (dig, craft, navigate…) could not be performed.
    ActionFailed,
    /// The server removed the agent.
    Kicked,
    /// A bug or invariant violation inside the client.
    Internal,
}

impl ErrorClass {
    /// Refused/reset failures usually mean the server itself is unavailable,
    /// so they trigger a fleet-wide backoff.
    pub fn is_connection(&self) -> bool {
        matches!(self, ErrorClass::ConnectionRefused | ErrorClass::ConnectionReset)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::ConnectionRefused => write!(f, "connection refused"),
            ErrorClass::ConnectionReset => write!(f, "connection reset"),
            ErrorClass::Timeout => write!(f, "timeout"),
            ErrorClass::ActionFailed => write!(f, "action failed"),
            ErrorClass::Kicked => write!(f, "kicked"),
            ErrorClass::Internal => write!(f, "internal"),
        }
    }
}

/// Error reported by the game client or one of its sessions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct ClientError {
    pub class: ErrorClass,
    pub message: String,
}

impl ClientError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ConnectionRefused, message)
    }

    pub fn reset(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ConnectionReset, message)
    }

    pub fn action(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ActionFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, message)
    }

    pub fn is_connection(&self) -> bool {
        self.class.is_connection()
    }
}
