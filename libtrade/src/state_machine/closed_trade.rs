use crate::role::TradeRole;
use crate::state_machine::lifecycle::ClosureKind;
use crate::transaction::Txid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The public record of how a trade ended. Contains no secret material, so it can be archived as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRecord {
    pub trade_id: String,
    pub role: TradeRole,
    pub outcome: ClosureKind,
    pub closed_at: DateTime<Utc>,
    /// Compressed aggregated key of the buyer output, hex encoded
    pub buyer_output_key: String,
    pub seller_output_key: String,
    pub deposit_txid: Txid,
    /// Transactions handed back to the caller for broadcast when the trade closed
    pub published_txids: Vec<Txid>,
}

impl ClosureRecord {
    pub fn is_cooperative(&self) -> bool {
        matches!(self.outcome, ClosureKind::Cooperative)
    }
}
