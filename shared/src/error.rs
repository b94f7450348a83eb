//! Failure taxonomy for session operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad class of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Session state did not allow the operation; the link was not touched
    Precondition,
    /// Opening a link failed (timeout, I/O, negotiation)
    Connection,
    /// The link raised an error mid-operation
    Link,
}

/// Errors raised by the vehicle session manager
///
/// Connection and link variants carry the underlying error text verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Not connected")]
    NotConnected,

    #[error("Not armed")]
    NotArmed,

    #[error("Vehicle not armable")]
    NotArmable,

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("{0}")]
    Connection(String),

    #[error("No COM ports found")]
    NoPorts,

    #[error("Could not connect to any port")]
    NoWorkingPort,

    #[error("{0}")]
    Link(String),
}

impl SessionError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::NotConnected
            | SessionError::NotArmed
            | SessionError::NotArmable
            | SessionError::NoPorts => FailureKind::Precondition,
            SessionError::Connection(_) | SessionError::NoWorkingPort => FailureKind::Connection,
            SessionError::Timeout(_) | SessionError::Link(_) => FailureKind::Link,
        }
    }
}
