//! Two coordinators, one per peer, sharing a mock chain. Messages are passed between them by hand, the way the
//! trading apps would relay them.
use futures::StreamExt;
use libtrade::multisig::{read_scalar, Point};
use libtrade::transaction::{Receiver, SignedTx, Txid};
use libtrade::wallet::InMemoryWallet;
use libtrade::{TradeRole, TradeStage};
use log::*;
use std::sync::Arc;
use trade_coordinator::message_types::*;
use trade_coordinator::{CoordinatorConfig, MockChain, RpcStatus, TradeCoordinator};

pub type Coordinator = TradeCoordinator<InMemoryWallet, MockChain>;

pub const BUYER_TRADE_ID: &str = "buyer-trade-0";
pub const SELLER_TRADE_ID: &str = "seller-trade-0";

#[derive(Clone, Debug)]
pub struct OfferTerms {
    pub trade_amount: u64,
    pub buyers_security_deposit: u64,
    pub sellers_security_deposit: u64,
    pub deposit_tx_fee_rate: f64,
    pub prepared_tx_fee_rate: f64,
}

impl Default for OfferTerms {
    fn default() -> Self {
        OfferTerms {
            trade_amount: 200_000,
            buyers_security_deposit: 30_000,
            sellers_security_deposit: 30_000,
            deposit_tx_fee_rate: 12.5,
            prepared_tx_fee_rate: 10.0,
        }
    }
}

/// One side of the trade and everything it has received from its coordinator so far.
pub struct TradePeer {
    pub trade_id: String,
    pub role: TradeRole,
    pub coordinator: Coordinator,
    pub init: Option<InitTradeResponse>,
    pub nonce_shares: Option<NonceSharesMessage>,
    pub partial_signatures: Option<PartialSignaturesMessage>,
    pub deposit: Option<DepositPsbt>,
    pub closure: Option<CloseTradeResponse>,
}

impl TradePeer {
    pub fn new(
        trade_id: &str,
        role: TradeRole,
        coins: &[u64],
        config: CoordinatorConfig,
        chain: Arc<MockChain>,
    ) -> Self {
        let wallet = InMemoryWallet::new(trade_id, coins);
        let coordinator = match TradeCoordinator::new(config, wallet, chain) {
            Ok(c) => c,
            Err(e) => panic!("Could not create the coordinator for {trade_id}: {e}"),
        };
        TradePeer {
            trade_id: trade_id.to_string(),
            role,
            coordinator,
            init: None,
            nonce_shares: None,
            partial_signatures: None,
            deposit: None,
            closure: None,
        }
    }

    pub async fn stage(&self) -> Result<TradeStage, RpcStatus> {
        self.coordinator.trade_stage(&self.trade_id).await
    }

    pub async fn init_trade(&mut self) -> Result<(), RpcStatus> {
        let req = InitTradeRequest { trade_id: self.trade_id.clone(), role: self.role };
        self.init = Some(self.coordinator.init_trade(req).await?);
        Ok(())
    }

    pub fn nonce_request(&self, peer: &InitTradeResponse, terms: &OfferTerms) -> NonceSharesRequest {
        NonceSharesRequest {
            trade_id: self.trade_id.clone(),
            buyer_output_peers_pub_key_share: peer.buyer_output_pub_key_share.clone(),
            seller_output_peers_pub_key_share: peer.seller_output_pub_key_share.clone(),
            deposit_tx_fee_rate: terms.deposit_tx_fee_rate,
            prepared_tx_fee_rate: terms.prepared_tx_fee_rate,
            trade_amount: terms.trade_amount,
            buyers_security_deposit: terms.buyers_security_deposit,
            sellers_security_deposit: terms.sellers_security_deposit,
        }
    }

    /// Publish the deposit tx and follow the confirmation updates until the coordinator considers it confirmed.
    pub async fn publish_deposit(&self) -> Result<u32, RpcStatus> {
        let req = PublishDepositTxRequest { trade_id: self.trade_id.clone() };
        let mut updates = self.coordinator.publish_deposit_tx(req).await?;
        let mut confirmations = 0;
        while let Some(update) = updates.next().await {
            let status = update?;
            debug!("{}: deposit tx at {} confirmations", self.trade_id, status.num_confirmations);
            confirmations = status.num_confirmations;
        }
        Ok(confirmations)
    }

    pub async fn close(&mut self, req: CloseTradeRequest) -> Result<&CloseTradeResponse, RpcStatus> {
        let response = self.coordinator.close_trade(req).await?;
        Ok(self.closure.insert(response))
    }

    /// Whether the close handed us the full private key of our own output.
    pub async fn my_output_key_matches(&self) -> Result<bool, RpcStatus> {
        let Some(key) = self.closure.as_ref().and_then(|c| c.my_output_prv_key.as_deref()) else {
            return Ok(false);
        };
        let key = read_scalar("myOutputPrvKey", key).map_err(|e| RpcStatus::invalid(e.to_string()))?;
        let session = self.coordinator.sessions().peek(&self.trade_id).await?;
        let (p, q) = session.model().keys().aggregated_keys().map_err(|e| RpcStatus::internal(e.to_string()))?;
        let mine: Point = if self.role.is_buyer() { p } else { q };
        Ok(key.base_point_mul() == mine)
    }
}

/// A buyer and a seller trading with each other over a shared chain.
pub struct TradeHarness {
    pub chain: Arc<MockChain>,
    pub buyer: TradePeer,
    pub seller: TradePeer,
    pub terms: OfferTerms,
    pub receivers: Vec<Receiver>,
    pub swap: Option<SwapTxSignatureResponse>,
}

impl TradeHarness {
    pub fn new(config: CoordinatorConfig, terms: OfferTerms) -> Self {
        let chain = Arc::new(MockChain::with_auto_mine());
        let buyer = TradePeer::new(BUYER_TRADE_ID, TradeRole::BuyerAsTaker, &[50_000], config.clone(), chain.clone());
        let seller =
            TradePeer::new(SELLER_TRADE_ID, TradeRole::SellerAsMaker, &[150_000, 100_000], config, chain.clone());
        let receivers = vec![Receiver::new("dao-receiver", 240_000), Receiver::new("contributor", 10_000)];
        TradeHarness { chain, buyer, seller, terms, receivers, swap: None }
    }

    pub async fn init_trade(&mut self) -> Result<(), RpcStatus> {
        self.buyer.init_trade().await?;
        self.seller.init_trade().await
    }

    pub async fn exchange_nonce_shares(&mut self) -> Result<(), RpcStatus> {
        let (buyer_init, seller_init) = match (&self.buyer.init, &self.seller.init) {
            (Some(b), Some(s)) => (b.clone(), s.clone()),
            _ => return Err(RpcStatus::internal("Both peers must initialise the trade first")),
        };
        let req = self.buyer.nonce_request(&seller_init, &self.terms);
        self.buyer.nonce_shares = Some(self.buyer.coordinator.get_nonce_shares(req).await?);
        let req = self.seller.nonce_request(&buyer_init, &self.terms);
        self.seller.nonce_shares = Some(self.seller.coordinator.get_nonce_shares(req).await?);
        Ok(())
    }

    pub async fn exchange_partial_signatures(&mut self) -> Result<(), RpcStatus> {
        let (buyers_nonces, sellers_nonces) = match (&self.buyer.nonce_shares, &self.seller.nonce_shares) {
            (Some(b), Some(s)) => (b.clone(), s.clone()),
            _ => return Err(RpcStatus::internal("Nonce shares have not been exchanged")),
        };
        let req = PartialSignaturesRequest {
            trade_id: self.buyer.trade_id.clone(),
            peers_nonce_shares: sellers_nonces,
            receivers: self.receivers.clone(),
        };
        self.buyer.partial_signatures = Some(self.buyer.coordinator.get_partial_signatures(req).await?);
        let req = PartialSignaturesRequest {
            trade_id: self.seller.trade_id.clone(),
            peers_nonce_shares: buyers_nonces,
            receivers: self.receivers.clone(),
        };
        self.seller.partial_signatures = Some(self.seller.coordinator.get_partial_signatures(req).await?);
        Ok(())
    }

    /// Both peers sign the deposit tx. The buyer keeps its swap tx partial signature back.
    pub async fn sign_deposit(&mut self) -> Result<(), RpcStatus> {
        let (buyers_sigs, sellers_sigs) = match (&self.buyer.partial_signatures, &self.seller.partial_signatures) {
            (Some(b), Some(s)) => (b.redacted(), s.clone()),
            _ => return Err(RpcStatus::internal("Partial signatures have not been exchanged")),
        };
        let req =
            DepositTxSignatureRequest { trade_id: self.buyer.trade_id.clone(), peers_partial_signatures: sellers_sigs };
        self.buyer.deposit = Some(self.buyer.coordinator.sign_deposit_tx(req).await?);
        let req =
            DepositTxSignatureRequest { trade_id: self.seller.trade_id.clone(), peers_partial_signatures: buyers_sigs };
        self.seller.deposit = Some(self.seller.coordinator.sign_deposit_tx(req).await?);
        Ok(())
    }

    /// Both peers publish the deposit tx and wait for it to confirm. Returns the seller's confirmation count.
    pub async fn publish_deposit(&mut self) -> Result<u32, RpcStatus> {
        self.buyer.publish_deposit().await?;
        self.seller.publish_deposit().await
    }

    pub fn deposit_txid(&self) -> Option<&str> {
        self.buyer.deposit.as_ref().map(|d| d.deposit_txid.as_str())
    }

    /// The buyer hands over its swap tx partial signature and the seller completes the swap tx.
    pub async fn sign_swap(&mut self) -> Result<(), RpcStatus> {
        let partial = self
            .buyer
            .partial_signatures
            .as_ref()
            .and_then(|s| s.swap_tx_input_partial_signature.clone())
            .ok_or_else(|| RpcStatus::internal("The buyer has no swap tx partial signature"))?;
        let req = SwapTxSignatureRequest {
            trade_id: self.seller.trade_id.clone(),
            swap_tx_input_peers_partial_signature: partial,
        };
        self.swap = Some(self.seller.coordinator.sign_swap_tx(req).await?);
        Ok(())
    }

    /// The buyer closes with the seller's key share from the swap signing step, then hands its own share over.
    pub async fn close_cooperatively(&mut self) -> Result<(), RpcStatus> {
        let sellers_share = self
            .swap
            .as_ref()
            .map(|s| s.peer_output_prv_key_share.clone())
            .ok_or_else(|| RpcStatus::internal("The swap tx has not been signed"))?;
        let req = CloseTradeRequest {
            trade_id: self.buyer.trade_id.clone(),
            my_output_peers_prv_key_share: Some(sellers_share),
            swap_tx: None,
        };
        let buyers_share = self
            .buyer
            .close(req)
            .await?
            .peer_output_prv_key_share
            .clone()
            .ok_or_else(|| RpcStatus::internal("The buyer did not disclose its key share"))?;
        let req = CloseTradeRequest {
            trade_id: self.seller.trade_id.clone(),
            my_output_peers_prv_key_share: Some(buyers_share),
            swap_tx: None,
        };
        self.seller.close(req).await?;
        Ok(())
    }

    /// What a peer watching the chain would learn about the swap tx.
    pub async fn swap_tx_on_chain(&self) -> Option<Vec<u8>> {
        let swap = self.swap.as_ref()?;
        let txid = SignedTx::from_bytes(&swap.swap_tx).ok()?.txid();
        self.chain.raw_tx(&txid).await
    }

    pub async fn is_on_chain(&self, txid: &str) -> bool {
        let txids = self.chain.broadcast_txids().await;
        txids.iter().any(|t: &Txid| t.to_string() == txid)
    }
}
