mod lifecycle_tests;

use crate::state_machine::{DepositArtifact, TradePolicy, TradeSession};
use crate::trade_model::PartialSignatureBundle;
use crate::transaction::{Receiver, TradeTerms};
use crate::wallet::{party_tx_data, InMemoryWallet};
use crate::TradeRole;
use std::time::Duration;

pub fn policy() -> TradePolicy {
    TradePolicy {
        peer_response_timeout: Duration::from_secs(60),
        required_confirmations: 2,
        redirect_timelock_blocks: 144,
    }
}

pub fn terms() -> TradeTerms {
    TradeTerms::new(200_000, 30_000, 30_000, 12.5, 10.0).unwrap()
}

pub fn receivers() -> Vec<Receiver> {
    vec![Receiver::new("dao-receiver", 240_000), Receiver::new("contributor", 10_000)]
}

pub struct TradePair {
    pub buyer: TradeSession,
    pub seller: TradeSession,
    /// The buyer's partial signatures, swap partial included
    pub buyers_sigs: PartialSignatureBundle,
    pub buyers_deposit: DepositArtifact,
    pub sellers_deposit: DepositArtifact,
}

/// Run both sides of a trade through key, nonce and signature exchange, and publish the deposit.
pub fn published_trade() -> TradePair {
    let mut buyer = TradeSession::new("buyer-trade-0", TradeRole::BuyerAsTaker, policy());
    let mut seller = TradeSession::new("seller-trade-0", TradeRole::SellerAsMaker, policy());
    let mut buyers_wallet = InMemoryWallet::new("buyer", &[50_000]);
    let mut sellers_wallet = InMemoryWallet::new("seller", &[150_000, 100_000]);

    let (bp, bq) = buyer.my_pub_key_shares();
    let (sp, sq) = seller.my_pub_key_shares();
    let buyer_data = party_tx_data(&mut buyers_wallet, &terms(), buyer.role()).unwrap();
    let seller_data = party_tx_data(&mut sellers_wallet, &terms(), seller.role()).unwrap();
    let buyers_nonces = buyer.get_nonce_shares(sp, sq, terms(), buyer_data).unwrap();
    let sellers_nonces = seller.get_nonce_shares(bp, bq, terms(), seller_data).unwrap();

    let buyers_sigs = buyer.get_partial_signatures(sellers_nonces, &receivers()).unwrap();
    let sellers_sigs = seller.get_partial_signatures(buyers_nonces, &receivers()).unwrap();

    let sellers_deposit = seller.sign_deposit_tx(buyers_sigs.redacted()).unwrap();
    let buyers_deposit = buyer.sign_deposit_tx(sellers_sigs).unwrap();
    buyer.mark_deposit_published().unwrap();
    seller.mark_deposit_published().unwrap();
    TradePair { buyer, seller, buyers_sigs, buyers_deposit, sellers_deposit }
}
