use cucumber::World;
use e2e::{OfferTerms, TradeHarness, TradePeer};
use std::fmt::{Debug, Formatter};
use trade_coordinator::CoordinatorConfig;

#[derive(World)]
pub struct TradeWorld {
    pub harness: TradeHarness,
}

impl Default for TradeWorld {
    fn default() -> Self {
        // Short enough that the timeout scenarios run in a second or so
        let config = CoordinatorConfig {
            peer_response_timeout_secs: 1,
            confirmation_poll_interval_secs: 1,
            ..Default::default()
        };
        Self { harness: TradeHarness::new(config, OfferTerms::default()) }
    }
}

impl Debug for TradeWorld {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeWorld")
            .field("buyer", &self.harness.buyer.trade_id)
            .field("seller", &self.harness.seller.trade_id)
            .field("terms", &self.harness.terms)
            .finish()
    }
}

impl TradeWorld {
    pub fn peer(&self, who: &str) -> &TradePeer {
        match who {
            "buyer" => &self.harness.buyer,
            "seller" => &self.harness.seller,
            _ => panic!("Unknown peer {who}"),
        }
    }

    pub fn peer_mut(&mut self, who: &str) -> &mut TradePeer {
        match who {
            "buyer" => &mut self.harness.buyer,
            "seller" => &mut self.harness.seller,
            _ => panic!("Unknown peer {who}"),
        }
    }
}
