use crate::state_machine::lifecycle::TradeStage;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutReason {
    /// What we were waiting for
    reason: String,
    /// The stage of the trade when the peer went quiet
    stage: TradeStage,
}

impl TimeoutReason {
    pub fn new(reason: impl Into<String>, stage: TradeStage) -> Self {
        TimeoutReason { reason: reason.into(), stage }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn stage(&self) -> TradeStage {
        self.stage
    }
}
