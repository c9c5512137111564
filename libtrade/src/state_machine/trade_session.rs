use crate::error::TradeError;
use crate::multisig::{PartialSignature, Point, Scalar};
use crate::role::TradeRole;
use crate::state_machine::closed_trade::ClosureRecord;
use crate::state_machine::error::LifeCycleError;
use crate::state_machine::lifecycle::{ClosureKind, TradeStage, UncooperativeReason};
use crate::state_machine::TimeoutReason;
use crate::trade_model::{FallbackTxs, NonceShareBundle, PartialSignatureBundle, TradeModel};
use crate::transaction::{PartyTxData, Receiver, SignedTx, TradeTerms, UnsignedTx};
use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use tokio::time::Instant;

/// Per-coordinator protocol parameters that every session is created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePolicy {
    /// How long the peer may stay silent before the uncooperative closure path opens up.
    pub peer_response_timeout: Duration,
    /// Deposit confirmations required before the seller signs the swap tx.
    pub required_confirmations: u32,
    /// Relative timelock, in blocks, on the redirect transaction input.
    pub redirect_timelock_blocks: u16,
}

impl Default for TradePolicy {
    fn default() -> Self {
        TradePolicy {
            peer_response_timeout: Duration::from_secs(600),
            required_confirmations: 1,
            redirect_timelock_blocks: 144,
        }
    }
}

/// The deposit transaction and our signed fallback transactions, returned once we sign the deposit.
#[derive(Clone, Debug, PartialEq)]
pub struct DepositArtifact {
    pub deposit_tx: UnsignedTx,
    pub fallback: FallbackTxs,
}

/// What the seller hands the buyer after signing the swap tx.
pub struct SwapTxSignature {
    pub swap_tx: SignedTx,
    /// The seller's private key share for the buyer output.
    pub peer_output_prv_key_share: Scalar,
}

impl Debug for SwapTxSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SwapTxSignature({}, ****)", self.swap_tx.txid())
    }
}

pub enum CloseRequest {
    /// The peer disclosed its private key share for our output.
    PeerKeyShare(Scalar),
    /// (Buyer) the seller's swap tx was seen on chain.
    SwapTxObserved(SignedTx),
    /// Nothing arrived from the peer. Only allowed once the peer has timed out.
    Forced,
}

pub struct TradeClosure {
    pub record: ClosureRecord,
    /// Our private key share for the peer's output, when it is safe to hand over.
    pub my_prv_key_share_for_peer_output: Option<Scalar>,
    /// The full spending key of our own output, if we learnt the peer's share for it.
    pub my_output_prv_key: Option<Scalar>,
    /// Transactions the caller should broadcast to enforce the outcome.
    pub to_publish: Vec<SignedTx>,
}

impl Debug for TradeClosure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let share = if self.my_prv_key_share_for_peer_output.is_some() { "****" } else { "none" };
        let key = if self.my_output_prv_key.is_some() { "****" } else { "none" };
        f.debug_struct("TradeClosure")
            .field("record", &self.record)
            .field("my_prv_key_share_for_peer_output", &share)
            .field("my_output_prv_key", &key)
            .field("to_publish", &self.to_publish.iter().map(SignedTx::txid).collect::<Vec<_>>())
            .finish()
    }
}

/// A single trade as seen by one peer: the cryptographic state plus the lifecycle that gates it.
#[derive(Debug)]
pub struct TradeSession {
    model: TradeModel,
    stage: TradeStage,
    policy: TradePolicy,
    last_progress: Instant,
    timeout: Option<TimeoutReason>,
    confirmations: u32,
    closure: Option<ClosureRecord>,
}

impl TradeSession {
    /// Create a session with fresh key shares.
    pub fn new(trade_id: impl Into<String>, role: TradeRole, policy: TradePolicy) -> Self {
        let model = TradeModel::new(trade_id, role);
        debug!("⚡️ New trade {} as {role}", model.trade_id());
        TradeSession {
            model,
            stage: TradeStage::Created,
            policy,
            last_progress: Instant::now(),
            timeout: None,
            confirmations: 0,
            closure: None,
        }
    }

    pub fn trade_id(&self) -> &str {
        self.model.trade_id()
    }

    pub fn role(&self) -> TradeRole {
        self.model.role()
    }

    pub fn stage(&self) -> TradeStage {
        self.stage
    }

    pub fn policy(&self) -> &TradePolicy {
        &self.policy
    }

    pub fn model(&self) -> &TradeModel {
        &self.model
    }

    pub fn confirmations(&self) -> u32 {
        self.confirmations
    }

    pub fn timeout(&self) -> Option<&TimeoutReason> {
        self.timeout.as_ref()
    }

    pub fn closure(&self) -> Option<&ClosureRecord> {
        self.closure.as_ref()
    }

    /// Our public key shares for the buyer and seller outputs.
    pub fn my_pub_key_shares(&self) -> (Point, Point) {
        self.model.my_pub_key_shares()
    }

    fn require_stage(&self, operation: &str, allowed: &[TradeStage]) -> Result<(), LifeCycleError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(LifeCycleError::invalid_state_for(operation, self.stage))
        }
    }

    fn transition(&mut self, next: TradeStage) -> Result<(), LifeCycleError> {
        if !self.stage.can_transition_to(next) {
            return Err(LifeCycleError::InvalidStateTransition { from: self.stage, to: next });
        }
        debug!("⚡️ {}: {} -> {next}", self.trade_id(), self.stage);
        self.stage = next;
        self.last_progress = Instant::now();
        Ok(())
    }

    /// Aggregate the peer's key shares, fix the terms and generate our nonce shares.
    pub fn get_nonce_shares(
        &mut self,
        peers_buyer_output_share: Point,
        peers_seller_output_share: Point,
        terms: TradeTerms,
        my_tx_data: PartyTxData,
    ) -> Result<NonceShareBundle, TradeError> {
        self.require_stage("get_nonce_shares", &[TradeStage::Created])?;
        self.model.aggregate_key_shares(peers_buyer_output_share, peers_seller_output_share)?;
        let bundle = self.model.init_my_nonce_shares(terms, my_tx_data)?;
        self.transition(TradeStage::KeysExchanged)?;
        Ok(bundle)
    }

    /// Take the peer's nonce shares, build the transactions and produce our partial signatures.
    pub fn get_partial_signatures(
        &mut self,
        peers_bundle: NonceShareBundle,
        receivers: &[Receiver],
    ) -> Result<PartialSignatureBundle, TradeError> {
        self.require_stage("get_partial_signatures", &[TradeStage::KeysExchanged])?;
        self.model.set_peers_nonce_shares(peers_bundle, receivers, self.policy.redirect_timelock_blocks)?;
        self.transition(TradeStage::NoncesExchanged)?;
        let bundle = self.model.sign_partial()?;
        self.transition(TradeStage::PartiallySigned)?;
        Ok(bundle)
    }

    /// Verify the peer's partial signatures and aggregate our warning and redirect transactions. The swap field of
    /// the peer's bundle may be absent.
    pub fn sign_deposit_tx(&mut self, peers_sigs: PartialSignatureBundle) -> Result<DepositArtifact, TradeError> {
        self.require_stage("sign_deposit_tx", &[TradeStage::PartiallySigned])?;
        let fallback = self.model.set_peers_partial_signatures(peers_sigs)?.clone();
        let deposit_tx = self.deposit_tx()?.clone();
        self.transition(TradeStage::DepositSigned)?;
        info!("⚡️ {}: deposit tx {} signed", self.trade_id(), deposit_tx.txid());
        Ok(DepositArtifact { deposit_tx, fallback })
    }

    fn deposit_tx(&self) -> Result<&UnsignedTx, LifeCycleError> {
        self.model
            .transactions()
            .map(|txs| &txs.deposit)
            .ok_or_else(|| LifeCycleError::InternalError("transactions missing after signing".into()))
    }

    /// Record that the deposit tx was handed to the network. Returns the tx to broadcast.
    pub fn mark_deposit_published(&mut self) -> Result<UnsignedTx, TradeError> {
        self.require_stage("publish_deposit_tx", &[TradeStage::DepositSigned])?;
        let deposit_tx = self.deposit_tx()?.clone();
        self.transition(TradeStage::DepositPublished)?;
        Ok(deposit_tx)
    }

    /// Record the deposit confirmation count. Counts never go backwards.
    pub fn record_confirmations(&mut self, confirmations: u32) -> Result<(), TradeError> {
        self.require_stage(
            "record_confirmations",
            &[TradeStage::DepositPublished, TradeStage::SwapSigned],
        )?;
        if confirmations > self.confirmations {
            trace!("{}: deposit tx has {confirmations} confirmations", self.trade_id());
            self.confirmations = confirmations;
        }
        Ok(())
    }

    pub fn is_deposit_confirmed(&self) -> bool {
        self.confirmations >= self.policy.required_confirmations
    }

    /// Note that the peer failed to respond in time. This opens the forced closure path.
    pub fn record_timeout(&mut self, reason: impl Into<String>) -> TimeoutReason {
        let reason = TimeoutReason::new(reason, self.stage);
        warn!("{}: peer timed out in {}: {}", self.trade_id(), self.stage, reason.reason());
        self.timeout = Some(reason.clone());
        reason
    }

    fn peer_timed_out(&self) -> Result<(), LifeCycleError> {
        if self.timeout.is_some() {
            return Ok(());
        }
        let elapsed = self.last_progress.elapsed();
        if elapsed >= self.policy.peer_response_timeout {
            Ok(())
        } else {
            let remaining_secs = (self.policy.peer_response_timeout - elapsed).as_secs();
            Err(LifeCycleError::PeerStillResponsive { remaining_secs })
        }
    }

    /// (Seller) complete the swap tx with the buyer's partial signature and disclose our key share for the buyer
    /// output.
    pub fn sign_swap_tx(&mut self, buyers_partial_sig: PartialSignature) -> Result<SwapTxSignature, TradeError> {
        if !self.role().is_seller() {
            return Err(LifeCycleError::wrong_role("seller").into());
        }
        self.require_stage("sign_swap_tx", &[TradeStage::DepositPublished])?;
        if !self.is_deposit_confirmed() {
            let err = LifeCycleError::NotConfirmed { have: self.confirmations, need: self.policy.required_confirmations };
            return Err(err.into());
        }
        let swap_tx = self.model.sign_swap_tx(buyers_partial_sig)?.clone();
        self.transition(TradeStage::SwapSigned)?;
        Ok(SwapTxSignature { swap_tx, peer_output_prv_key_share: self.model.my_prv_key_share_for_peers_output() })
    }

    /// Close the trade, cooperatively if the peer's key share is supplied.
    pub fn close_trade(&mut self, request: CloseRequest) -> Result<TradeClosure, TradeError> {
        let closure = self.prepare_close(request)?;
        self.commit_close(&closure)?;
        Ok(closure)
    }

    /// Check the close request and work out the outcome without leaving the current stage. Nothing is committed
    /// until [`Self::commit_close`], so a closure whose transactions could not be broadcast can be prepared again.
    pub fn prepare_close(&mut self, request: CloseRequest) -> Result<TradeClosure, TradeError> {
        let is_buyer = self.role().is_buyer();
        let (kind, disclose, my_output_prv_key, to_publish) = match request {
            CloseRequest::PeerKeyShare(share) => {
                let stage = if is_buyer { TradeStage::DepositPublished } else { TradeStage::SwapSigned };
                self.require_stage("close_trade", &[stage])?;
                let key = self.model.accept_peers_prv_key_share(share)?;
                (ClosureKind::Cooperative, true, Some(key), vec![])
            }
            CloseRequest::SwapTxObserved(swap_tx) => {
                if !is_buyer {
                    return Err(LifeCycleError::wrong_role("buyer").into());
                }
                self.require_stage("close_trade", &[TradeStage::DepositPublished])?;
                let key = self.model.recover_from_swap_tx(&swap_tx)?;
                // The seller output is already spent, so our share for it is worthless to withhold
                (ClosureKind::Uncooperative(UncooperativeReason::SwapTxObserved), true, Some(key), vec![])
            }
            CloseRequest::Forced => {
                self.require_stage("close_trade", &[TradeStage::DepositPublished, TradeStage::SwapSigned])?;
                self.peer_timed_out()?;
                if self.stage == TradeStage::SwapSigned {
                    let swap_tx = self.model.swap_tx().cloned().ok_or_else(|| {
                        LifeCycleError::InternalError("swap tx missing in the SwapSigned stage".into())
                    })?;
                    (ClosureKind::Uncooperative(UncooperativeReason::SwapTxPublished), false, None, vec![swap_tx])
                } else {
                    let fallback = self.model.fallback_txs().cloned().ok_or_else(|| {
                        LifeCycleError::InternalError("fallback txs missing after the deposit was signed".into())
                    })?;
                    // The redirect tx becomes valid once the warning tx has matured past the timelock
                    let txs = vec![fallback.warning_tx, fallback.redirect_tx];
                    (ClosureKind::Uncooperative(UncooperativeReason::WarningTxFallback), false, None, txs)
                }
            }
        };
        let record = self.closure_record(kind, &to_publish)?;
        let my_prv_key_share_for_peer_output = disclose.then(|| self.model.my_prv_key_share_for_peers_output());
        Ok(TradeClosure { record, my_prv_key_share_for_peer_output, my_output_prv_key, to_publish })
    }

    /// Move a prepared closure into the terminal stage.
    pub fn commit_close(&mut self, closure: &TradeClosure) -> Result<(), TradeError> {
        let kind = closure.record.outcome;
        self.transition(TradeStage::Closed(kind))?;
        self.closure = Some(closure.record.clone());
        info!("⚡️ {}: trade closed. {kind}", self.trade_id());
        Ok(())
    }

    fn closure_record(&self, outcome: ClosureKind, published: &[SignedTx]) -> Result<ClosureRecord, TradeError> {
        let (p, q) = self.model.keys().aggregated_keys()?;
        Ok(ClosureRecord {
            trade_id: self.trade_id().to_string(),
            role: self.role(),
            outcome,
            closed_at: Utc::now(),
            buyer_output_key: hex::encode(p.serialize()),
            seller_output_key: hex::encode(q.serialize()),
            deposit_txid: self.deposit_tx()?.txid(),
            published_txids: published.iter().map(SignedTx::txid).collect(),
        })
    }
}
