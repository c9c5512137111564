//! The per-peer trade coordinator. Each handler validates its request, runs the operation against the trade's session
//! with exclusive access and maps failures onto an [`RpcStatus`].
use crate::config::{ConfigError, CoordinatorConfig};
use crate::errors::RpcStatus;
use crate::message_types::*;
use crate::monitor::{watch_confirmations, ChainBackend, ConfirmationStream};
use libtrade::state_machine::error::LifeCycleError;
use libtrade::state_machine::{ClosureRecord, CloseRequest};
use libtrade::storage::FileStore;
use libtrade::trade_model::{NonceShareBundle, PartialSignatureBundle};
use libtrade::transaction::SignedTx;
use libtrade::wallet::{party_tx_data, TradeWallet};
use libtrade::{SessionStore, TradeError, TradeSession, TradeStage};
use log::*;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct TradeCoordinator<W: TradeWallet, C: ChainBackend> {
    config: CoordinatorConfig,
    sessions: SessionStore,
    wallet: Mutex<W>,
    chain: Arc<C>,
    archive: Option<Mutex<FileStore>>,
}

impl<W: TradeWallet, C: ChainBackend> TradeCoordinator<W, C> {
    pub fn new(config: CoordinatorConfig, wallet: W, chain: Arc<C>) -> Result<Self, ConfigError> {
        config.validate()?;
        let archive = match &config.archive_dir {
            Some(dir) => {
                info!("Archiving closed trades in {}", dir.display());
                Some(Mutex::new(FileStore::new(dir.clone())?))
            }
            None => None,
        };
        Ok(TradeCoordinator { config, sessions: SessionStore::new(), wallet: Mutex::new(wallet), chain, archive })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub async fn trade_stage(&self, trade_id: &str) -> Result<TradeStage, RpcStatus> {
        Ok(self.sessions.peek(trade_id).await?.stage())
    }

    fn chain_error(e: C::Error) -> RpcStatus {
        RpcStatus::internal(format!("Chain backend error: {e}"))
    }

    /// Start a trade: generate our key shares for both outputs.
    pub async fn init_trade(&self, req: InitTradeRequest) -> Result<InitTradeResponse, RpcStatus> {
        if req.trade_id.is_empty() {
            return Err(RpcStatus::invalid("The trade id must not be empty"));
        }
        let session = TradeSession::new(&req.trade_id, req.role, self.config.policy());
        let (p, q) = session.my_pub_key_shares();
        self.sessions.create(session).await?;
        let current_block_height = self.chain.block_height().await.map_err(Self::chain_error)?;
        Ok(InitTradeResponse {
            buyer_output_pub_key_share: p.serialize().to_vec(),
            seller_output_pub_key_share: q.serialize().to_vec(),
            current_block_height,
        })
    }

    /// Take the peer's key shares and the trade terms, fund our half of the deposit and return our nonce shares.
    pub async fn get_nonce_shares(&self, req: NonceSharesRequest) -> Result<NonceSharesMessage, RpcStatus> {
        let (p, q) = peer_key_shares(&req)?;
        let terms = req.terms().map_err(TradeError::from)?;
        let mut session = self.sessions.checkout(&req.trade_id).await.map_err(|e| match e {
            TradeError::NotFound(id) => TradeError::precondition(format!("Trade {id} has not been initialised")),
            other => other,
        })?;
        // Coins are only reserved once we know the session will accept them
        if session.stage() != TradeStage::Created {
            return Err(TradeError::from(LifeCycleError::invalid_state_for("get_nonce_shares", session.stage())).into());
        }
        let tx_data = {
            let mut wallet = self.wallet.lock().await;
            party_tx_data(&mut *wallet, &terms, session.role())?
        };
        let half_deposit = tx_data.half_deposit.clone();
        match session.get_nonce_shares(p, q, terms, tx_data) {
            Ok(bundle) => Ok(NonceSharesMessage::from(&bundle)),
            Err(e) => {
                warn!("{}: returning reserved coins to the wallet. {e}", req.trade_id);
                self.wallet.lock().await.release_half_deposit(&half_deposit);
                Err(e.into())
            }
        }
    }

    /// Take the peer's nonce shares and redirect receivers, and return our partial signatures for every input. The
    /// buyer should only pass on the [redacted](PartialSignaturesMessage::redacted) message.
    pub async fn get_partial_signatures(
        &self,
        req: PartialSignaturesRequest,
    ) -> Result<PartialSignaturesMessage, RpcStatus> {
        let peers_bundle = NonceShareBundle::try_from(&req.peers_nonce_shares)?;
        let receivers = req.receivers;
        let bundle = self
            .sessions
            .with_exclusive_access(&req.trade_id, |s| s.get_partial_signatures(peers_bundle, &receivers))
            .await?;
        Ok(PartialSignaturesMessage::from(&bundle))
    }

    /// Verify the peer's partial signatures and return the deposit tx along with our fully signed fallback txs.
    pub async fn sign_deposit_tx(&self, req: DepositTxSignatureRequest) -> Result<DepositPsbt, RpcStatus> {
        let peers_sigs = PartialSignatureBundle::try_from(&req.peers_partial_signatures)?;
        let artifact =
            self.sessions.with_exclusive_access(&req.trade_id, |s| s.sign_deposit_tx(peers_sigs)).await?;
        Ok(DepositPsbt {
            deposit_txid: artifact.deposit_tx.txid().to_string(),
            deposit_psbt: artifact.deposit_tx.to_bytes(),
            warning_tx: artifact.fallback.warning_tx.to_bytes(),
            redirect_tx: artifact.fallback.redirect_tx.to_bytes(),
        })
    }

    /// Broadcast the deposit tx and stream its confirmations. Both peers may publish; the chain sees one tx.
    pub async fn publish_deposit_tx(&self, req: PublishDepositTxRequest) -> Result<ConfirmationStream, RpcStatus> {
        let deposit_tx = self.sessions.with_exclusive_access(&req.trade_id, |s| s.mark_deposit_published()).await?;
        let txid = deposit_tx.txid();
        let tx = deposit_tx.to_bytes();
        self.chain.broadcast(txid, tx.clone()).await.map_err(Self::chain_error)?;
        info!("{}: published deposit tx {txid}", req.trade_id);
        Ok(watch_confirmations(
            Arc::clone(&self.chain),
            self.sessions.clone(),
            req.trade_id,
            tx,
            txid,
            self.config.required_confirmations,
            self.config.confirmation_poll_interval(),
        ))
    }

    /// (Seller) complete the swap tx with the buyer's partial signature once the deposit is confirmed.
    pub async fn sign_swap_tx(&self, req: SwapTxSignatureRequest) -> Result<SwapTxSignatureResponse, RpcStatus> {
        let partial = req.partial_signature()?;
        let signed = self.sessions.with_exclusive_access(&req.trade_id, |s| s.sign_swap_tx(partial)).await?;
        Ok(SwapTxSignatureResponse {
            swap_tx: signed.swap_tx.to_bytes(),
            peer_output_prv_key_share: signed.peer_output_prv_key_share.serialize().to_vec(),
        })
    }

    /// Close the trade. Any transactions the closure needs are broadcast before the trade is marked closed. If a
    /// broadcast fails, the trade stays in its current stage and the close can be retried.
    pub async fn close_trade(&self, req: CloseTradeRequest) -> Result<CloseTradeResponse, RpcStatus> {
        let request = match (&req.my_output_peers_prv_key_share, &req.swap_tx) {
            (Some(_), Some(_)) => {
                return Err(RpcStatus::invalid("Supply the peer's key share or the swap tx, not both"));
            }
            (Some(share), None) => CloseRequest::PeerKeyShare(prv_key_share(share)?),
            (None, Some(tx)) => CloseRequest::SwapTxObserved(SignedTx::from_bytes(tx).map_err(TradeError::from)?),
            (None, None) => CloseRequest::Forced,
        };
        // The session stays checked out until the closure is committed, so nothing can interleave with the broadcast
        let closure = {
            let mut session = self.sessions.checkout(&req.trade_id).await?;
            let closure = session.prepare_close(request)?;
            for tx in &closure.to_publish {
                let txid = tx.txid();
                self.chain.broadcast(txid, tx.to_bytes()).await.map_err(|e| {
                    error!("{}: tx {txid} could not be broadcast, the trade stays open: {e}", req.trade_id);
                    Self::chain_error(e)
                })?;
                info!("{}: published tx {txid}", req.trade_id);
            }
            session.commit_close(&closure)?;
            closure
        };
        if self.archive.is_some() {
            self.archive_closed().await;
        }
        Ok(CloseTradeResponse {
            outcome: closure.record.outcome,
            peer_output_prv_key_share: closure.my_prv_key_share_for_peer_output.map(|k| k.serialize().to_vec()),
            my_output_prv_key: closure.my_output_prv_key.map(|k| k.serialize().to_vec()),
            published_txids: closure.record.published_txids.iter().map(ToString::to_string).collect(),
        })
    }

    /// Wait for something from the peer for at most the configured response timeout. On expiry the timeout is
    /// recorded on the trade, which opens up the forced closure path.
    pub async fn await_peer<T, F>(&self, trade_id: &str, what: &str, fut: F) -> Result<T, RpcStatus>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(self.config.peer_response_timeout(), fut).await {
            Ok(value) => Ok(value),
            Err(_) => {
                let reason = format!("no {what} from the peer");
                let reason = self.sessions.with_exclusive_access(trade_id, |s| Ok(s.record_timeout(reason))).await?;
                Err(TradeError::from(LifeCycleError::Timeout(reason)).into())
            }
        }
    }

    /// Move closed trades into the archive. Returns what was archived; nothing happens without an archive directory.
    pub async fn archive_closed(&self) -> Vec<ClosureRecord> {
        match &self.archive {
            Some(archive) => {
                let mut store = archive.lock().await;
                self.sessions.evict_closed(&mut *store).await
            }
            None => vec![],
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::monitor::MockChain;
    use futures::StreamExt;
    use libtrade::multisig::read_scalar;
    use libtrade::state_machine::{ClosureKind, UncooperativeReason};
    use libtrade::storage::ArchiveStore;
    use libtrade::transaction::Receiver;
    use libtrade::wallet::InMemoryWallet;
    use libtrade::{StatusCode, TradeRole};

    pub(crate) type Coordinator = TradeCoordinator<InMemoryWallet, MockChain>;

    pub(crate) const BUYER: &str = "buyer-trade-0";
    pub(crate) const SELLER: &str = "seller-trade-0";

    fn new_coordinator(config: CoordinatorConfig) -> Coordinator {
        TradeCoordinator::new(config, InMemoryWallet::new("test", &[500_000]), Arc::new(MockChain::new())).unwrap()
    }

    fn nonce_request(trade_id: &str, init: &InitTradeResponse) -> NonceSharesRequest {
        NonceSharesRequest {
            trade_id: trade_id.into(),
            buyer_output_peers_pub_key_share: init.buyer_output_pub_key_share.clone(),
            seller_output_peers_pub_key_share: init.seller_output_pub_key_share.clone(),
            deposit_tx_fee_rate: 12.5,
            prepared_tx_fee_rate: 10.0,
            trade_amount: 200_000,
            buyers_security_deposit: 30_000,
            sellers_security_deposit: 30_000,
        }
    }

    pub(crate) struct SignedTrade {
        pub chain: Arc<MockChain>,
        pub buyer: Coordinator,
        pub seller: Coordinator,
        /// The buyer's partial signatures, swap partial included
        pub buyers_sigs: PartialSignaturesMessage,
    }

    /// Two coordinators on one chain, taken through key, nonce and signature exchange up to a signed deposit tx.
    pub(crate) async fn signed_trade(
        buyer_config: CoordinatorConfig,
        seller_config: CoordinatorConfig,
        chain: Arc<MockChain>,
    ) -> SignedTrade {
        let buyer = TradeCoordinator::new(buyer_config, InMemoryWallet::new("buyer", &[50_000]), chain.clone()).unwrap();
        let seller =
            TradeCoordinator::new(seller_config, InMemoryWallet::new("seller", &[300_000]), chain.clone()).unwrap();
        let buyer_init = buyer
            .init_trade(InitTradeRequest { trade_id: BUYER.into(), role: TradeRole::BuyerAsTaker })
            .await
            .unwrap();
        let seller_init = seller
            .init_trade(InitTradeRequest { trade_id: SELLER.into(), role: TradeRole::SellerAsMaker })
            .await
            .unwrap();
        let buyers_nonces = buyer.get_nonce_shares(nonce_request(BUYER, &seller_init)).await.unwrap();
        let sellers_nonces = seller.get_nonce_shares(nonce_request(SELLER, &buyer_init)).await.unwrap();
        let receivers = vec![Receiver::new("dao", 250_000)];
        let req = PartialSignaturesRequest {
            trade_id: BUYER.into(),
            peers_nonce_shares: sellers_nonces,
            receivers: receivers.clone(),
        };
        let buyers_sigs = buyer.get_partial_signatures(req).await.unwrap();
        let req = PartialSignaturesRequest { trade_id: SELLER.into(), peers_nonce_shares: buyers_nonces, receivers };
        let sellers_sigs = seller.get_partial_signatures(req).await.unwrap();
        let req = DepositTxSignatureRequest { trade_id: BUYER.into(), peers_partial_signatures: sellers_sigs };
        buyer.sign_deposit_tx(req).await.unwrap();
        let req = DepositTxSignatureRequest { trade_id: SELLER.into(), peers_partial_signatures: buyers_sigs.redacted() };
        seller.sign_deposit_tx(req).await.unwrap();
        SignedTrade { chain, buyer, seller, buyers_sigs }
    }

    #[tokio::test]
    async fn init_trade_twice() {
        env_logger::try_init().ok();
        let coordinator = new_coordinator(CoordinatorConfig::default());
        let req = InitTradeRequest { trade_id: "buyer-trade-0".into(), role: TradeRole::BuyerAsTaker };
        let resp = coordinator.init_trade(req.clone()).await.unwrap();
        assert_eq!(resp.buyer_output_pub_key_share.len(), 33);
        assert_eq!(resp.current_block_height, MockChain::START_HEIGHT);
        let err = coordinator.init_trade(req).await.unwrap_err();
        assert_eq!(err.code, StatusCode::AlreadyExists);
        let err = coordinator
            .init_trade(InitTradeRequest { trade_id: String::new(), role: TradeRole::SellerAsMaker })
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn nonce_shares_need_an_initialised_trade() {
        let coordinator = new_coordinator(CoordinatorConfig::default());
        let peer = new_coordinator(CoordinatorConfig::default());
        let init = peer
            .init_trade(InitTradeRequest { trade_id: "peer".into(), role: TradeRole::SellerAsMaker })
            .await
            .unwrap();
        let err = coordinator.get_nonce_shares(nonce_request("buyer-trade-0", &init)).await.unwrap_err();
        assert_eq!(err.code, StatusCode::FailedPrecondition);
        assert!(err.message.contains("has not been initialised"), "{err}");

        let err = coordinator
            .sign_swap_tx(SwapTxSignatureRequest {
                trade_id: "buyer-trade-0".into(),
                swap_tx_input_peers_partial_signature: vec![1; 32],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);
    }

    #[tokio::test]
    async fn nonce_shares_only_reserve_coins_once() {
        let coordinator = new_coordinator(CoordinatorConfig::default());
        let init = coordinator
            .init_trade(InitTradeRequest { trade_id: "buyer-trade-0".into(), role: TradeRole::BuyerAsTaker })
            .await
            .unwrap();
        let peer = new_coordinator(CoordinatorConfig::default());
        let peer_init = peer
            .init_trade(InitTradeRequest { trade_id: "seller-trade-0".into(), role: TradeRole::SellerAsMaker })
            .await
            .unwrap();
        let msg = coordinator.get_nonce_shares(nonce_request("buyer-trade-0", &peer_init)).await.unwrap();
        assert_eq!(msg.swap_tx_input_nonce_share.len(), 66);
        assert!(msg.payout_address.starts_with("test-payout"));
        let balance = coordinator.wallet.lock().await.balance();

        let err = coordinator.get_nonce_shares(nonce_request("buyer-trade-0", &peer_init)).await.unwrap_err();
        assert_eq!(err.code, StatusCode::FailedPrecondition);
        assert_eq!(coordinator.wallet.lock().await.balance(), balance);

        let mut bad = nonce_request("buyer-trade-0", &init);
        bad.buyer_output_peers_pub_key_share.truncate(10);
        let err = coordinator.get_nonce_shares(bad).await.unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn close_request_must_pick_one_path() {
        let coordinator = new_coordinator(CoordinatorConfig::default());
        let req = CloseTradeRequest {
            trade_id: "buyer-trade-0".into(),
            my_output_peers_prv_key_share: Some(vec![1; 32]),
            swap_tx: Some(vec![2; 100]),
        };
        let err = coordinator.close_trade(req).await.unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let config = CoordinatorConfig { peer_response_timeout_secs: 5, ..Default::default() };
        let coordinator = new_coordinator(config);
        coordinator
            .init_trade(InitTradeRequest { trade_id: "seller-trade-0".into(), role: TradeRole::SellerAsMaker })
            .await
            .unwrap();
        let answer = coordinator.await_peer("seller-trade-0", "answer", async { 42 }).await.unwrap();
        assert_eq!(answer, 42);
        let err = coordinator
            .await_peer("seller-trade-0", "nonce shares", futures::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::DeadlineExceeded);
        assert!(err.message.contains("no nonce shares from the peer"), "{err}");
        let session = coordinator.sessions().peek("seller-trade-0").await.unwrap();
        assert_eq!(session.timeout().map(|t| t.stage()), Some(TradeStage::Created));
    }

    #[tokio::test]
    async fn archive_is_optional() {
        let coordinator = new_coordinator(CoordinatorConfig::default());
        assert!(coordinator.archive_closed().await.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let config = CoordinatorConfig { archive_dir: Some(dir.path().join("closed")), ..Default::default() };
        let coordinator = new_coordinator(config);
        assert!(dir.path().join("closed").is_dir());
        coordinator
            .init_trade(InitTradeRequest { trade_id: "buyer-trade-0".into(), role: TradeRole::BuyerAsTaker })
            .await
            .unwrap();
        // Open trades stay put
        assert!(coordinator.archive_closed().await.is_empty());
        assert!(coordinator.sessions().exists("buyer-trade-0").await);
        let store = FileStore::new(dir.path().join("closed")).unwrap();
        assert!(store.load_record("buyer-trade-0").is_err());
    }

    #[tokio::test]
    async fn rejected_key_shares_release_the_coins() {
        env_logger::try_init().ok();
        let coordinator = new_coordinator(CoordinatorConfig::default());
        let own = coordinator
            .init_trade(InitTradeRequest { trade_id: BUYER.into(), role: TradeRole::BuyerAsTaker })
            .await
            .unwrap();
        let balance = coordinator.wallet.lock().await.balance();

        let err = coordinator.get_nonce_shares(nonce_request(BUYER, &own)).await.unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
        assert_eq!(coordinator.trade_stage(BUYER).await.unwrap(), TradeStage::Created);
        assert_eq!(coordinator.wallet.lock().await.balance(), balance);

        let peer = new_coordinator(CoordinatorConfig::default());
        let peer_init = peer
            .init_trade(InitTradeRequest { trade_id: SELLER.into(), role: TradeRole::SellerAsMaker })
            .await
            .unwrap();
        let mut huge_fee = nonce_request(BUYER, &peer_init);
        huge_fee.prepared_tx_fee_rate = 1e20;
        let err = coordinator.get_nonce_shares(huge_fee).await.unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
        assert_eq!(coordinator.wallet.lock().await.balance(), balance);

        coordinator.get_nonce_shares(nonce_request(BUYER, &peer_init)).await.unwrap();
        assert!(coordinator.wallet.lock().await.balance() < balance);
        assert_eq!(coordinator.trade_stage(BUYER).await.unwrap(), TradeStage::KeysExchanged);
    }

    #[tokio::test]
    async fn cooperative_close_returns_the_spending_key() {
        env_logger::try_init().ok();
        let dir = tempfile::tempdir().unwrap();
        let archiving = CoordinatorConfig { archive_dir: Some(dir.path().to_path_buf()), ..Default::default() };
        let chain = Arc::new(MockChain::with_auto_mine());
        let trade = signed_trade(archiving, CoordinatorConfig::default(), chain).await;
        let mut updates =
            trade.buyer.publish_deposit_tx(PublishDepositTxRequest { trade_id: BUYER.into() }).await.unwrap();
        while let Some(update) = updates.next().await {
            update.unwrap();
        }
        let mut updates =
            trade.seller.publish_deposit_tx(PublishDepositTxRequest { trade_id: SELLER.into() }).await.unwrap();
        while let Some(update) = updates.next().await {
            update.unwrap();
        }
        let swap_partial = trade.buyers_sigs.swap_tx_input_partial_signature.clone().unwrap();
        let req = SwapTxSignatureRequest { trade_id: SELLER.into(), swap_tx_input_peers_partial_signature: swap_partial };
        let swap = trade.seller.sign_swap_tx(req).await.unwrap();

        let req = CloseTradeRequest {
            trade_id: BUYER.into(),
            my_output_peers_prv_key_share: Some(swap.peer_output_prv_key_share),
            swap_tx: None,
        };
        let closed = trade.buyer.close_trade(req).await.unwrap();
        assert_eq!(closed.outcome, ClosureKind::Cooperative);
        // Archived right away, so the response is all that is left of the session
        assert!(!trade.buyer.sessions().exists(BUYER).await);
        let key = read_scalar("myOutputPrvKey", &closed.my_output_prv_key.unwrap()).unwrap();
        let record = FileStore::new(dir.path().to_path_buf()).unwrap().load_record(BUYER).unwrap();
        assert_eq!(hex::encode(key.base_point_mul().serialize()), record.buyer_output_key);

        let req = CloseTradeRequest {
            trade_id: SELLER.into(),
            my_output_peers_prv_key_share: closed.peer_output_prv_key_share,
            swap_tx: None,
        };
        let closed = trade.seller.close_trade(req).await.unwrap();
        let key = read_scalar("myOutputPrvKey", &closed.my_output_prv_key.unwrap()).unwrap();
        let session = trade.seller.sessions().peek(SELLER).await.unwrap();
        let (_, q) = session.model().keys().aggregated_keys().unwrap();
        assert_eq!(key.base_point_mul(), q);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_broadcast_keeps_the_trade_open() {
        env_logger::try_init().ok();
        let config = CoordinatorConfig { peer_response_timeout_secs: 5, ..Default::default() };
        let trade = signed_trade(config.clone(), config, Arc::new(MockChain::new())).await;
        let updates =
            trade.buyer.publish_deposit_tx(PublishDepositTxRequest { trade_id: BUYER.into() }).await.unwrap();
        updates.cancel();
        let err = trade.buyer.await_peer(BUYER, "key share", futures::future::pending::<()>()).await.unwrap_err();
        assert_eq!(err.code, StatusCode::DeadlineExceeded);

        trade.chain.set_offline(true).await;
        let forced = CloseTradeRequest { trade_id: BUYER.into(), ..Default::default() };
        let err = trade.buyer.close_trade(forced.clone()).await.unwrap_err();
        assert_eq!(err.code, StatusCode::Internal);
        assert_eq!(trade.buyer.trade_stage(BUYER).await.unwrap(), TradeStage::DepositPublished);

        trade.chain.set_offline(false).await;
        let closed = trade.buyer.close_trade(forced).await.unwrap();
        assert_eq!(closed.outcome, ClosureKind::Uncooperative(UncooperativeReason::WarningTxFallback));
        assert_eq!(closed.published_txids.len(), 2);
        assert!(closed.my_output_prv_key.is_none());
        assert!(trade.buyer.trade_stage(BUYER).await.unwrap().is_closed());
    }
}
