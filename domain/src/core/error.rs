//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Invalid site scope: {0}")]
    InvalidScope(String),

    #[error("No message is currently streaming")]
    NothingInFlight,
}
