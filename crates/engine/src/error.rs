//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`KeyNotFound`] thrown when a card, user or transfer does not exist.
//! - [`Validation`] thrown when a request is malformed (same-card transfer,
//!   non-positive amount, bad filter).
//! - [`StateConflict`] thrown when a card lifecycle state forbids the operation.
//! - [`Forbidden`] thrown when the actor lacks the required capability.
//! - [`InsufficientFunds`] thrown when a source card cannot cover a transfer.
//! - [`Encryption`] thrown by the card number codec.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Validation`]: EngineError::Validation
//!  [`StateConflict`]: EngineError::StateConflict
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`Encryption`]: EngineError::Encryption
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("State conflict: {0}")]
    StateConflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Encryption failure: {0}")]
    Encryption(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::StateConflict(a), Self::StateConflict(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::Encryption(a), Self::Encryption(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
