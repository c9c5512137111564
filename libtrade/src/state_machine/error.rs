use crate::state_machine::lifecycle::TradeStage;
use crate::state_machine::TimeoutReason;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum LifeCycleError {
    #[error("The trade is in the {stage} stage, which does not allow {operation}")]
    InvalidState { operation: String, stage: TradeStage },
    #[error("A trade cannot move from {from} to {to}")]
    InvalidStateTransition { from: TradeStage, to: TradeStage },
    #[error("Only the {0} can do this")]
    WrongRole(String),
    #[error("The deposit transaction has {have} confirmations but {need} are required")]
    NotConfirmed { have: u32, need: u32 },
    #[error("The peer is still within its response window ({remaining_secs}s left). Close cooperatively or wait.")]
    PeerStillResponsive { remaining_secs: u64 },
    #[error("Timed out: {}", .0.reason())]
    Timeout(TimeoutReason),
    #[error("This is a bug. {0}")]
    InternalError(String),
}

impl LifeCycleError {
    pub fn invalid_state_for(operation: &str, stage: TradeStage) -> Self {
        LifeCycleError::InvalidState { operation: operation.into(), stage }
    }

    pub fn wrong_role(who: impl Into<String>) -> Self {
        LifeCycleError::WrongRole(who.into())
    }
}
