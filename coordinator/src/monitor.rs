//! Chain access and deposit confirmation tracking.
use crate::errors::RpcStatus;
use crate::message_types::TxConfirmationStatus;
use futures::future::{AbortHandle, Abortable};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use libtrade::transaction::Txid;
use libtrade::SessionStore;
use log::*;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// The coordinator's view of the blockchain.
pub trait ChainBackend: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn block_height(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Hand a fully signed transaction to the network. Broadcasting the same transaction twice is not an error.
    fn broadcast(&self, txid: Txid, tx: Vec<u8>) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// `None` if the transaction is unknown, `Some(0)` while it sits in the mempool.
    fn confirmations(&self, txid: Txid) -> impl Future<Output = Result<Option<u32>, Self::Error>> + Send;
}

#[derive(Debug, Error)]
#[error("Mock chain error: {0}")]
pub struct MockChainError(String);

#[derive(Default)]
struct ChainState {
    height: u64,
    mempool: Vec<Txid>,
    mined_at: HashMap<Txid, u64>,
    raw: HashMap<Txid, Vec<u8>>,
    offline: bool,
}

impl ChainState {
    fn mine(&mut self) {
        self.height += 1;
        for txid in self.mempool.drain(..) {
            self.mined_at.insert(txid, self.height);
        }
    }
}

/// An in-memory chain. Broadcast transactions are mined in the next block. With auto-mining on, every confirmation
/// query mines a block first, which keeps tests from having to drive the chain by hand.
pub struct MockChain {
    state: Mutex<ChainState>,
    auto_mine: bool,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub const START_HEIGHT: u64 = 900_000;

    pub fn new() -> Self {
        let state = ChainState { height: Self::START_HEIGHT, ..Default::default() };
        MockChain { state: Mutex::new(state), auto_mine: false }
    }

    pub fn with_auto_mine() -> Self {
        MockChain { auto_mine: true, ..Self::new() }
    }

    pub async fn mine_blocks(&self, n: u64) {
        let mut state = self.state.lock().await;
        for _ in 0..n {
            state.mine();
        }
        trace!("Mock chain at height {}", state.height);
    }

    /// The raw bytes of a broadcast transaction, as a peer watching the chain would see them.
    pub async fn raw_tx(&self, txid: &Txid) -> Option<Vec<u8>> {
        self.state.lock().await.raw.get(txid).cloned()
    }

    /// While offline, every broadcast fails.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    pub async fn broadcast_txids(&self) -> Vec<Txid> {
        self.state.lock().await.raw.keys().copied().collect()
    }
}

impl ChainBackend for MockChain {
    type Error = MockChainError;

    async fn block_height(&self) -> Result<u64, Self::Error> {
        Ok(self.state.lock().await.height)
    }

    async fn broadcast(&self, txid: Txid, tx: Vec<u8>) -> Result<(), Self::Error> {
        if tx.is_empty() {
            return Err(MockChainError(format!("empty transaction {txid}")));
        }
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(MockChainError(format!("offline, cannot broadcast {txid}")));
        }
        if state.raw.insert(txid, tx).is_none() {
            debug!("Mock chain accepted tx {txid}");
            state.mempool.push(txid);
        }
        Ok(())
    }

    async fn confirmations(&self, txid: Txid) -> Result<Option<u32>, Self::Error> {
        let mut state = self.state.lock().await;
        if self.auto_mine {
            state.mine();
        }
        if state.mempool.contains(&txid) {
            return Ok(Some(0));
        }
        let confs = state.mined_at.get(&txid).map(|h| (state.height - h + 1) as u32);
        Ok(confs)
    }
}

/// Deposit confirmation updates. Ends once the required depth is reached, on the first error, or when cancelled.
pub struct ConfirmationStream {
    inner: Abortable<BoxStream<'static, Result<TxConfirmationStatus, RpcStatus>>>,
    handle: AbortHandle,
}

impl ConfirmationStream {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.clone()
    }
}

impl Stream for ConfirmationStream {
    type Item = Result<TxConfirmationStatus, RpcStatus>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct Watch<C> {
    chain: Arc<C>,
    sessions: SessionStore,
    trade_id: String,
    tx: Vec<u8>,
    txid: Txid,
    required: u32,
    poll_interval: Duration,
    last_seen: Option<u32>,
    done: bool,
}

impl<C: ChainBackend> Watch<C> {
    /// Query the chain and record the count on the session. `Ok(None)` means the trade closed in the meantime.
    async fn poll(&self) -> Result<Option<TxConfirmationStatus>, RpcStatus> {
        let chain_err = |e: C::Error| RpcStatus::internal(format!("Chain backend error: {e}"));
        let num_confirmations = self.chain.confirmations(self.txid).await.map_err(chain_err)?.unwrap_or(0);
        let current_block_height = self.chain.block_height().await.map_err(chain_err)?;
        let open = self
            .sessions
            .with_exclusive_access(&self.trade_id, |session| {
                if session.stage().is_closed() {
                    return Ok(false);
                }
                session.record_confirmations(num_confirmations)?;
                Ok(true)
            })
            .await?;
        Ok(open.then(|| TxConfirmationStatus { tx: self.tx.clone(), current_block_height, num_confirmations }))
    }

    async fn next_update(mut self) -> Option<(Result<TxConfirmationStatus, RpcStatus>, Self)> {
        if self.done {
            return None;
        }
        loop {
            if self.last_seen.is_some() {
                tokio::time::sleep(self.poll_interval).await;
            }
            let status = match self.poll().await {
                Ok(Some(status)) => status,
                Ok(None) => {
                    debug!("{}: trade closed, no longer watching the deposit tx", self.trade_id);
                    return None;
                }
                Err(e) => {
                    warn!("{}: giving up on deposit tx {}. {e}", self.trade_id, self.txid);
                    self.done = true;
                    return Some((Err(e), self));
                }
            };
            let first = self.last_seen.is_none();
            let changed = self.last_seen != Some(status.num_confirmations);
            self.last_seen = Some(status.num_confirmations);
            if status.num_confirmations >= self.required {
                info!("{}: deposit tx {} is confirmed", self.trade_id, self.txid);
                self.done = true;
            }
            if first || changed {
                return Some((Ok(status), self));
            }
        }
    }
}

/// Watch `txid` until it has `required` confirmations, recording every new count on the trade's session.
pub fn watch_confirmations<C: ChainBackend>(
    chain: Arc<C>,
    sessions: SessionStore,
    trade_id: String,
    tx: Vec<u8>,
    txid: Txid,
    required: u32,
    poll_interval: Duration,
) -> ConfirmationStream {
    let watch = Watch {
        chain,
        sessions,
        trade_id,
        tx,
        txid,
        required,
        poll_interval,
        last_seen: None,
        done: false,
    };
    let updates = stream::unfold(watch, Watch::next_update).boxed();
    let (handle, registration) = AbortHandle::new_pair();
    ConfirmationStream { inner: Abortable::new(updates, registration), handle }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::message_types::PublishDepositTxRequest;
    use crate::server::test::{signed_trade, BUYER, SELLER};
    use libtrade::TradeStage;

    #[tokio::test]
    async fn mock_chain_mines_broadcast_txs() {
        let chain = MockChain::new();
        let txid = Txid::from([7u8; 32]);
        assert_eq!(chain.confirmations(txid).await.unwrap(), None);
        chain.broadcast(txid, vec![1, 2, 3]).await.unwrap();
        chain.broadcast(txid, vec![1, 2, 3]).await.unwrap();
        assert_eq!(chain.confirmations(txid).await.unwrap(), Some(0));
        chain.mine_blocks(3).await;
        assert_eq!(chain.confirmations(txid).await.unwrap(), Some(3));
        assert_eq!(chain.block_height().await.unwrap(), MockChain::START_HEIGHT + 3);
        assert_eq!(chain.raw_tx(&txid).await, Some(vec![1, 2, 3]));
        assert!(chain.broadcast(txid, vec![]).await.is_err());
    }

    #[tokio::test]
    async fn auto_mine() {
        let chain = MockChain::with_auto_mine();
        let txid = Txid::from([8u8; 32]);
        chain.broadcast(txid, vec![0]).await.unwrap();
        assert_eq!(chain.confirmations(txid).await.unwrap(), Some(1));
        assert_eq!(chain.confirmations(txid).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn unknown_trade_ends_the_stream() {
        env_logger::try_init().ok();
        let chain = Arc::new(MockChain::new());
        let txid = Txid::from([9u8; 32]);
        let sessions = SessionStore::new();
        let mut updates =
            watch_confirmations(chain, sessions, "no-such-trade".into(), vec![1], txid, 1, Duration::from_secs(1));
        let first = updates.next().await.unwrap();
        assert_eq!(first.unwrap_err().code, libtrade::StatusCode::NotFound);
        assert!(updates.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_stream_ends_and_releases_the_trade() {
        env_logger::try_init().ok();
        let config = CoordinatorConfig::default();
        let trade = signed_trade(config.clone(), config, Arc::new(MockChain::new())).await;
        let req = PublishDepositTxRequest { trade_id: SELLER.into() };
        let mut updates = trade.seller.publish_deposit_tx(req).await.unwrap();
        let first = updates.next().await.unwrap().unwrap();
        assert_eq!(first.num_confirmations, 0);

        // Nothing gets mined, so only the abort can end the stream
        let handle = updates.abort_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            handle.abort();
        });
        assert!(updates.next().await.is_none());
        assert!(updates.next().await.is_none());

        let session = trade.seller.sessions().checkout(SELLER).await.unwrap();
        assert_eq!(session.stage(), TradeStage::DepositPublished);
        assert_eq!(session.confirmations(), 0);
        drop(session);

        let req = PublishDepositTxRequest { trade_id: BUYER.into() };
        let mut updates = trade.buyer.publish_deposit_tx(req).await.unwrap();
        updates.cancel();
        assert!(updates.next().await.is_none());
        let session = trade.buyer.sessions().checkout(BUYER).await.unwrap();
        assert_eq!(session.stage(), TradeStage::DepositPublished);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ends_at_the_required_depth() {
        env_logger::try_init().ok();
        let config = CoordinatorConfig { required_confirmations: 3, ..Default::default() };
        let trade = signed_trade(config.clone(), config, Arc::new(MockChain::with_auto_mine())).await;
        let req = PublishDepositTxRequest { trade_id: SELLER.into() };
        let mut updates = trade.seller.publish_deposit_tx(req).await.unwrap();
        let mut seen = Vec::new();
        while let Some(update) = updates.next().await {
            seen.push(update.unwrap().num_confirmations);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(trade.seller.sessions().peek(SELLER).await.unwrap().confirmations(), 3);
    }
}
