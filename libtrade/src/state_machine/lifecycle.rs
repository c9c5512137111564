use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Why a trade closed without the peers exchanging their private key shares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UncooperativeReason {
    /// The buyer saw the seller's swap transaction and extracted the seller's key share from it.
    SwapTxObserved,
    /// The seller gave up waiting for the buyer's key share and relies on the swap transaction it already holds.
    SwapTxPublished,
    /// The peer went silent before the swap, so the warning transaction was published, to be followed by the
    /// timelocked redirect transaction.
    WarningTxFallback,
}

impl Display for UncooperativeReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UncooperativeReason::SwapTxObserved => write!(f, "swap tx observed"),
            UncooperativeReason::SwapTxPublished => write!(f, "swap tx published"),
            UncooperativeReason::WarningTxFallback => write!(f, "warning tx fallback"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClosureKind {
    Cooperative,
    Uncooperative(UncooperativeReason),
}

impl Display for ClosureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosureKind::Cooperative => write!(f, "Cooperative"),
            ClosureKind::Uncooperative(reason) => write!(f, "Uncooperative ({reason})"),
        }
    }
}

/// Where a trade is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStage {
    /// Key shares generated, waiting for the peer's.
    Created,
    /// Peer key shares aggregated and our nonce shares handed out.
    KeysExchanged,
    /// Peer nonce shares aggregated and transaction templates built.
    NoncesExchanged,
    /// Our partial signatures produced.
    PartiallySigned,
    /// Our warning and redirect transactions fully signed. The deposit can be published.
    DepositSigned,
    DepositPublished,
    /// (Seller) the swap transaction is fully signed and our key share for the buyer output disclosed.
    SwapSigned,
    Closed(ClosureKind),
}

impl TradeStage {
    pub fn is_closed(&self) -> bool {
        matches!(self, TradeStage::Closed(_))
    }

    pub fn can_transition_to(&self, next: TradeStage) -> bool {
        use TradeStage::*;
        matches!(
            (self, next),
            (Created, KeysExchanged)
                | (KeysExchanged, NoncesExchanged)
                | (NoncesExchanged, PartiallySigned)
                | (PartiallySigned, DepositSigned)
                | (DepositSigned, DepositPublished)
                | (DepositPublished, SwapSigned)
                | (DepositPublished, Closed(_))
                | (SwapSigned, Closed(_))
        )
    }
}

impl Display for TradeStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStage::Created => write!(f, "Created"),
            TradeStage::KeysExchanged => write!(f, "KeysExchanged"),
            TradeStage::NoncesExchanged => write!(f, "NoncesExchanged"),
            TradeStage::PartiallySigned => write!(f, "PartiallySigned"),
            TradeStage::DepositSigned => write!(f, "DepositSigned"),
            TradeStage::DepositPublished => write!(f, "DepositPublished"),
            TradeStage::SwapSigned => write!(f, "SwapSigned"),
            TradeStage::Closed(kind) => write!(f, "Closed[{kind}]"),
        }
    }
}
