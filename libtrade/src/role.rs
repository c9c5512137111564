use crate::error::ReadError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The part a peer plays in a trade. The buyer receives the traded bitcoin; the maker published the offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeRole {
    SellerAsMaker,
    SellerAsTaker,
    BuyerAsMaker,
    BuyerAsTaker,
}

impl Display for TradeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeRole::SellerAsMaker => write!(f, "SellerAsMaker"),
            TradeRole::SellerAsTaker => write!(f, "SellerAsTaker"),
            TradeRole::BuyerAsMaker => write!(f, "BuyerAsMaker"),
            TradeRole::BuyerAsTaker => write!(f, "BuyerAsTaker"),
        }
    }
}

impl TradeRole {
    pub const fn is_buyer(&self) -> bool {
        matches!(self, TradeRole::BuyerAsMaker | TradeRole::BuyerAsTaker)
    }

    pub const fn is_seller(&self) -> bool {
        !self.is_buyer()
    }

    pub const fn is_maker(&self) -> bool {
        matches!(self, TradeRole::SellerAsMaker | TradeRole::BuyerAsMaker)
    }

    /// The role the counterparty must hold for the trade to make sense.
    pub const fn counterparty(&self) -> Self {
        match self {
            TradeRole::SellerAsMaker => TradeRole::BuyerAsTaker,
            TradeRole::SellerAsTaker => TradeRole::BuyerAsMaker,
            TradeRole::BuyerAsMaker => TradeRole::SellerAsTaker,
            TradeRole::BuyerAsTaker => TradeRole::SellerAsMaker,
        }
    }

    pub const fn as_u8(&self) -> u8 {
        match self {
            TradeRole::SellerAsMaker => 0,
            TradeRole::SellerAsTaker => 1,
            TradeRole::BuyerAsMaker => 2,
            TradeRole::BuyerAsTaker => 3,
        }
    }
}

impl TryFrom<u8> for TradeRole {
    type Error = ReadError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TradeRole::SellerAsMaker),
            1 => Ok(TradeRole::SellerAsTaker),
            2 => Ok(TradeRole::BuyerAsMaker),
            3 => Ok(TradeRole::BuyerAsTaker),
            _ => Err(ReadError::new("TradeRole", format!("Unknown role value: {value}"))),
        }
    }
}

impl FromStr for TradeRole {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SellerAsMaker" | "SELLER_AS_MAKER" => Ok(TradeRole::SellerAsMaker),
            "SellerAsTaker" | "SELLER_AS_TAKER" => Ok(TradeRole::SellerAsTaker),
            "BuyerAsMaker" | "BUYER_AS_MAKER" => Ok(TradeRole::BuyerAsMaker),
            "BuyerAsTaker" | "BUYER_AS_TAKER" => Ok(TradeRole::BuyerAsTaker),
            _ => Err(ReadError::new("TradeRole", format!("Unknown role: {s}"))),
        }
    }
}
