use libtrade::{StatusCode, TradeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error a coordinator returns to its caller, akin to a gRPC status.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    pub code: StatusCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        RpcStatus { code, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }
}

impl From<TradeError> for RpcStatus {
    fn from(err: TradeError) -> Self {
        RpcStatus { code: err.code(), message: err.to_string() }
    }
}

impl From<libtrade::ReadError> for RpcStatus {
    fn from(err: libtrade::ReadError) -> Self {
        TradeError::from(err).into()
    }
}
