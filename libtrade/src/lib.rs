pub mod error;
pub mod helpers;
pub mod multisig;
pub mod role;
pub mod session_store;
pub mod state_machine;
pub mod storage;
pub mod trade_model;
pub mod transaction;
pub mod wallet;

#[cfg(test)]
mod tests;

pub use error::{ReadError, StatusCode, TradeError};
pub use role::TradeRole;
pub use session_store::SessionStore;
pub use state_machine::{TradePolicy, TradeSession, TradeStage};
