use crate::multisig::ProtocolError;
use crate::state_machine::error::LifeCycleError;
use crate::state_machine::TimeoutReason;
use crate::transaction::TxError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("error reading field '{field}': {error}")]
pub struct ReadError {
    field: String,
    error: String,
}

impl ReadError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self { field: field.into(), error: error.into() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

/// A coarse status code for every failure the coordinator reports to its caller. These map one-to-one onto the
/// status codes of the relay transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    InvalidArgument,
    Unauthenticated,
    DeadlineExceeded,
    Internal,
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCode::NotFound => write!(f, "NOT_FOUND"),
            StatusCode::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            StatusCode::FailedPrecondition => write!(f, "FAILED_PRECONDITION"),
            StatusCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            StatusCode::Unauthenticated => write!(f, "UNAUTHENTICATED"),
            StatusCode::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            StatusCode::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Errors surfaced by trade operations. None of these are retried inside the library; the caller decides.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("No trade with id {0} exists")]
    NotFound(String),
    #[error("A trade with id {0} already exists")]
    AlreadyExists(String),
    #[error("Operation not allowed in the current trade state. {0}")]
    FailedPrecondition(String),
    #[error("Invalid argument. {0}")]
    InvalidArgument(String),
    #[error("Peer data failed verification. {0}")]
    Unauthenticated(String),
    #[error("Timed out waiting for the peer: {}", .0.reason())]
    DeadlineExceeded(TimeoutReason),
    #[error("Internal error. {0}")]
    Internal(String),
}

impl TradeError {
    pub fn code(&self) -> StatusCode {
        match self {
            TradeError::NotFound(_) => StatusCode::NotFound,
            TradeError::AlreadyExists(_) => StatusCode::AlreadyExists,
            TradeError::FailedPrecondition(_) => StatusCode::FailedPrecondition,
            TradeError::InvalidArgument(_) => StatusCode::InvalidArgument,
            TradeError::Unauthenticated(_) => StatusCode::Unauthenticated,
            TradeError::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
            TradeError::Internal(_) => StatusCode::Internal,
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        TradeError::FailedPrecondition(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        TradeError::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TradeError::Internal(msg.into())
    }
}

impl From<LifeCycleError> for TradeError {
    fn from(err: LifeCycleError) -> Self {
        match err {
            LifeCycleError::InternalError(msg) => TradeError::Internal(msg),
            LifeCycleError::WrongRole(_) => TradeError::FailedPrecondition(err.to_string()),
            LifeCycleError::Timeout(reason) => TradeError::DeadlineExceeded(reason),
            other => TradeError::FailedPrecondition(other.to_string()),
        }
    }
}

impl From<ProtocolError> for TradeError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Verify(_)
            | ProtocolError::KeyShareMismatch(_)
            | ProtocolError::SecretKeys(_)
            | ProtocolError::AdaptorSecret => TradeError::Unauthenticated(err.to_string()),
            ProtocolError::KeyAgg(_) | ProtocolError::DuplicateKeyShare => TradeError::InvalidArgument(err.to_string()),
            ProtocolError::Signing(_) => TradeError::Internal(err.to_string()),
            other => TradeError::FailedPrecondition(other.to_string()),
        }
    }
}

impl From<ReadError> for TradeError {
    fn from(err: ReadError) -> Self {
        TradeError::InvalidArgument(err.to_string())
    }
}

impl From<TxError> for TradeError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Read(e) => TradeError::InvalidArgument(e.to_string()),
            TxError::MissingWitness(_) => TradeError::Internal(err.to_string()),
            other => TradeError::InvalidArgument(other.to_string()),
        }
    }
}
