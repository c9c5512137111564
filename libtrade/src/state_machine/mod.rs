// Trade lifecycle
mod closed_trade;
pub mod lifecycle;
mod trade_session;

pub mod error;
mod timeouts;

pub use closed_trade::ClosureRecord;
pub use lifecycle::{ClosureKind, TradeStage, UncooperativeReason};
pub use timeouts::TimeoutReason;
pub use trade_session::{
    CloseRequest, DepositArtifact, SwapTxSignature, TradeClosure, TradePolicy, TradeSession,
};
