use crate::error::ReadError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("Fee rate must be a positive, finite number of sats/vB, got {0}")]
    InvalidFeeRate(f64),
    #[error("{0} must be greater than zero")]
    ZeroAmount(&'static str),
    #[error("Amounts overflow")]
    Overflow,
    #[error("{what} of {value} sats is below the dust limit")]
    Dust { what: String, value: u64 },
    #[error("{what} needs {needed} sats but only {available} are available")]
    InsufficientFunds { what: String, needed: u64, available: u64 },
    #[error("At least one redirect receiver is required")]
    NoReceivers,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Input index {0} is out of range")]
    InputOutOfRange(usize),
    #[error("Expected {expected} witnesses, got {got}")]
    WitnessCount { expected: usize, got: usize },
    #[error("Missing witness at index {0}")]
    MissingWitness(usize),
    #[error("Witness for input {0} does not verify")]
    InvalidWitness(usize),
    #[error(transparent)]
    Read(#[from] ReadError),
}

impl TxError {
    pub fn dust(what: impl Into<String>, value: u64) -> Self {
        TxError::Dust { what: what.into(), value }
    }

    pub fn insufficient(what: impl Into<String>, needed: u64, available: u64) -> Self {
        TxError::InsufficientFunds { what: what.into(), needed, available }
    }
}
