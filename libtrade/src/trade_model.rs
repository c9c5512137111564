//! The cryptographic half of a trade: both key contexts, the seven signing contexts and the transactions they sign.
//!
//! [`TradeModel`] does not know about lifecycle stages. Calling its methods out of order fails with a
//! [`ProtocolError`] for missing data; the [`crate::state_machine::TradeSession`] wrapping it does the gating.
use crate::error::TradeError;
use crate::multisig::{KeyCtx, LiftedSignature, PartialSignature, Point, ProtocolError, PubNonce, Scalar, SigCtx};
use crate::role::TradeRole;
use crate::transaction::{PartyTxData, Receiver, SignedTx, TradeTerms, TradeTransactions, TxError, UnsignedTx};
use log::*;
use std::fmt::{Debug, Formatter};

/// Every transaction input the peers sign jointly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxInput {
    Swap,
    BuyersWarningBuyerInput,
    BuyersWarningSellerInput,
    SellersWarningBuyerInput,
    SellersWarningSellerInput,
    BuyersRedirect,
    SellersRedirect,
}

impl TxInput {
    pub const ALL: [TxInput; 7] = [
        TxInput::Swap,
        TxInput::BuyersWarningBuyerInput,
        TxInput::BuyersWarningSellerInput,
        TxInput::SellersWarningBuyerInput,
        TxInput::SellersWarningSellerInput,
        TxInput::BuyersRedirect,
        TxInput::SellersRedirect,
    ];

    /// Also used as extra input when deriving the nonce for this input.
    pub fn label(&self) -> &'static str {
        match self {
            TxInput::Swap => "swap tx input",
            TxInput::BuyersWarningBuyerInput => "buyer's warning tx buyer input",
            TxInput::BuyersWarningSellerInput => "buyer's warning tx seller input",
            TxInput::SellersWarningBuyerInput => "seller's warning tx buyer input",
            TxInput::SellersWarningSellerInput => "seller's warning tx seller input",
            TxInput::BuyersRedirect => "buyer's redirect tx input",
            TxInput::SellersRedirect => "seller's redirect tx input",
        }
    }

    /// Whether the input is signed with the buyer output key (P) rather than the seller output key (Q).
    pub fn spends_buyer_output(&self) -> bool {
        matches!(
            self,
            TxInput::BuyersWarningBuyerInput | TxInput::SellersWarningBuyerInput | TxInput::BuyersRedirect
        )
    }

    /// The transaction and input position this input refers to.
    pub fn locate<'a>(&self, txs: &'a TradeTransactions) -> (&'a UnsignedTx, usize) {
        match self {
            TxInput::Swap => (&txs.swap, 0),
            TxInput::BuyersWarningBuyerInput => (&txs.buyers_warning, 0),
            TxInput::BuyersWarningSellerInput => (&txs.buyers_warning, 1),
            TxInput::SellersWarningBuyerInput => (&txs.sellers_warning, 0),
            TxInput::SellersWarningSellerInput => (&txs.sellers_warning, 1),
            TxInput::BuyersRedirect => (&txs.buyers_redirect, 0),
            TxInput::SellersRedirect => (&txs.sellers_redirect, 0),
        }
    }

    pub fn message(&self, txs: &TradeTransactions) -> Result<[u8; 32], TxError> {
        let (tx, index) = self.locate(txs);
        tx.sighash(index)
    }
}

/// One value per jointly signed input.
#[derive(Clone, Debug, PartialEq)]
pub struct TxInputParams<T> {
    pub swap_tx_input: T,
    pub buyers_warning_tx_buyer_input: T,
    pub buyers_warning_tx_seller_input: T,
    pub sellers_warning_tx_buyer_input: T,
    pub sellers_warning_tx_seller_input: T,
    pub buyers_redirect_tx_input: T,
    pub sellers_redirect_tx_input: T,
}

impl<T> TxInputParams<T> {
    pub fn new_with(mut f: impl FnMut(TxInput) -> T) -> Self {
        TxInputParams {
            swap_tx_input: f(TxInput::Swap),
            buyers_warning_tx_buyer_input: f(TxInput::BuyersWarningBuyerInput),
            buyers_warning_tx_seller_input: f(TxInput::BuyersWarningSellerInput),
            sellers_warning_tx_buyer_input: f(TxInput::SellersWarningBuyerInput),
            sellers_warning_tx_seller_input: f(TxInput::SellersWarningSellerInput),
            buyers_redirect_tx_input: f(TxInput::BuyersRedirect),
            sellers_redirect_tx_input: f(TxInput::SellersRedirect),
        }
    }

    pub fn from_fn<E>(mut f: impl FnMut(TxInput) -> Result<T, E>) -> Result<Self, E> {
        Ok(TxInputParams {
            swap_tx_input: f(TxInput::Swap)?,
            buyers_warning_tx_buyer_input: f(TxInput::BuyersWarningBuyerInput)?,
            buyers_warning_tx_seller_input: f(TxInput::BuyersWarningSellerInput)?,
            sellers_warning_tx_buyer_input: f(TxInput::SellersWarningBuyerInput)?,
            sellers_warning_tx_seller_input: f(TxInput::SellersWarningSellerInput)?,
            buyers_redirect_tx_input: f(TxInput::BuyersRedirect)?,
            sellers_redirect_tx_input: f(TxInput::SellersRedirect)?,
        })
    }

    pub fn get(&self, input: TxInput) -> &T {
        match input {
            TxInput::Swap => &self.swap_tx_input,
            TxInput::BuyersWarningBuyerInput => &self.buyers_warning_tx_buyer_input,
            TxInput::BuyersWarningSellerInput => &self.buyers_warning_tx_seller_input,
            TxInput::SellersWarningBuyerInput => &self.sellers_warning_tx_buyer_input,
            TxInput::SellersWarningSellerInput => &self.sellers_warning_tx_seller_input,
            TxInput::BuyersRedirect => &self.buyers_redirect_tx_input,
            TxInput::SellersRedirect => &self.sellers_redirect_tx_input,
        }
    }

    pub fn get_mut(&mut self, input: TxInput) -> &mut T {
        match input {
            TxInput::Swap => &mut self.swap_tx_input,
            TxInput::BuyersWarningBuyerInput => &mut self.buyers_warning_tx_buyer_input,
            TxInput::BuyersWarningSellerInput => &mut self.buyers_warning_tx_seller_input,
            TxInput::SellersWarningBuyerInput => &mut self.sellers_warning_tx_buyer_input,
            TxInput::SellersWarningSellerInput => &mut self.sellers_warning_tx_seller_input,
            TxInput::BuyersRedirect => &mut self.buyers_redirect_tx_input,
            TxInput::SellersRedirect => &mut self.sellers_redirect_tx_input,
        }
    }
}

/// What a peer sends after aggregating key shares: its transaction data and one nonce share per input.
#[derive(Clone, Debug, PartialEq)]
pub struct NonceShareBundle {
    pub tx_data: PartyTxData,
    pub nonce_shares: TxInputParams<PubNonce>,
}

/// A peer's partial signatures on the *other* peer's warning and redirect transactions, plus its swap tx input
/// partial signature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartialSignatureBundle {
    pub peers_warning_tx_buyer_input: PartialSignature,
    pub peers_warning_tx_seller_input: PartialSignature,
    pub peers_redirect_tx_input: PartialSignature,
    /// Adaptor-form partial signature on the swap tx input. The buyer's must not reach the seller before the
    /// deposit is confirmed.
    pub swap_tx_input: Option<PartialSignature>,
}

impl PartialSignatureBundle {
    /// The bundle with the swap tx partial signature removed, safe to relay before the deposit confirms.
    pub fn redacted(self) -> Self {
        PartialSignatureBundle { swap_tx_input: None, ..self }
    }
}

/// The buyer output (P) and seller output (Q) key contexts.
pub struct OutputKeys {
    pub buyer_output: KeyCtx,
    pub seller_output: KeyCtx,
}

impl OutputKeys {
    pub fn random() -> Self {
        OutputKeys { buyer_output: KeyCtx::random(), seller_output: KeyCtx::random() }
    }

    pub fn for_input(&self, input: TxInput) -> &KeyCtx {
        if input.spends_buyer_output() {
            &self.buyer_output
        } else {
            &self.seller_output
        }
    }

    pub fn aggregated_keys(&self) -> Result<(Point, Point), ProtocolError> {
        Ok((self.buyer_output.aggregated_pub_key()?, self.seller_output.aggregated_pub_key()?))
    }
}

/// Transactions this peer can publish without the counterparty.
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackTxs {
    pub warning_tx: SignedTx,
    pub redirect_tx: SignedTx,
}

pub struct TradeModel {
    trade_id: String,
    role: TradeRole,
    keys: OutputKeys,
    sig_ctxs: TxInputParams<SigCtx>,
    terms: Option<TradeTerms>,
    my_tx_data: Option<PartyTxData>,
    transactions: Option<TradeTransactions>,
    fallback_txs: Option<FallbackTxs>,
    swap_tx: Option<SignedTx>,
    my_output_prv_key: Option<Scalar>,
}

impl Debug for TradeModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TradeModel({}, {})", self.trade_id, self.role)
    }
}

impl TradeModel {
    /// Start a trade with fresh key shares for both outputs.
    pub fn new(trade_id: impl Into<String>, role: TradeRole) -> Self {
        let sig_ctxs = TxInputParams::new_with(|input| SigCtx::new(input.label()));
        TradeModel {
            trade_id: trade_id.into(),
            role,
            keys: OutputKeys::random(),
            sig_ctxs,
            terms: None,
            my_tx_data: None,
            transactions: None,
            fallback_txs: None,
            swap_tx: None,
            my_output_prv_key: None,
        }
    }

    pub fn trade_id(&self) -> &str {
        &self.trade_id
    }

    pub fn role(&self) -> TradeRole {
        self.role
    }

    pub fn keys(&self) -> &OutputKeys {
        &self.keys
    }

    pub fn terms(&self) -> Option<&TradeTerms> {
        self.terms.as_ref()
    }

    pub fn transactions(&self) -> Option<&TradeTransactions> {
        self.transactions.as_ref()
    }

    pub fn fallback_txs(&self) -> Option<&FallbackTxs> {
        self.fallback_txs.as_ref()
    }

    pub fn swap_tx(&self) -> Option<&SignedTx> {
        self.swap_tx.as_ref()
    }

    /// The full spending key for our own output, once the peer's share for it is known.
    pub fn my_output_prv_key(&self) -> Option<Scalar> {
        self.my_output_prv_key
    }

    /// Our public key shares for the buyer and seller outputs, in that order.
    pub fn my_pub_key_shares(&self) -> (Point, Point) {
        (self.keys.buyer_output.my_pub_key_share(), self.keys.seller_output.my_pub_key_share())
    }

    fn my_output(&self) -> &KeyCtx {
        if self.role.is_buyer() {
            &self.keys.buyer_output
        } else {
            &self.keys.seller_output
        }
    }

    fn peers_output(&self) -> &KeyCtx {
        if self.role.is_buyer() {
            &self.keys.seller_output
        } else {
            &self.keys.buyer_output
        }
    }

    /// Our private key share for the peer's output. Handing this over gives the peer sole control of its output.
    pub fn my_prv_key_share_for_peers_output(&self) -> Scalar {
        self.peers_output().my_key_share().prv_key()
    }

    /// The adaptor point of the swap tx input: the seller's public key share for the buyer output.
    fn swap_adaptor_point(&self) -> Result<Point, ProtocolError> {
        if self.role.is_buyer() {
            self.keys.buyer_output.peers_pub_key_share()
        } else {
            Ok(self.keys.buyer_output.my_pub_key_share())
        }
    }

    pub fn aggregate_key_shares(
        &mut self,
        peers_buyer_output_share: Point,
        peers_seller_output_share: Point,
    ) -> Result<(), ProtocolError> {
        self.keys.buyer_output.set_peers_key_share(peers_buyer_output_share)?;
        self.keys.seller_output.set_peers_key_share(peers_seller_output_share)?;
        let (p, q) = self.keys.aggregated_keys()?;
        debug!(
            "⚡️ {}: aggregated buyer output key {} and seller output key {}",
            self.trade_id,
            hex::encode(p.serialize()),
            hex::encode(q.serialize())
        );
        Ok(())
    }

    /// Fix the trade terms and our transaction data, and generate a fresh nonce share for every input.
    pub fn init_my_nonce_shares(
        &mut self,
        terms: TradeTerms,
        my_tx_data: PartyTxData,
    ) -> Result<NonceShareBundle, TradeError> {
        let needed = terms.half_deposit_amount(self.role.is_buyer())?;
        let who = if self.role.is_buyer() { "buyer" } else { "seller" };
        my_tx_data.half_deposit.validate(who, needed)?;
        let keys = &self.keys;
        let sig_ctxs = &mut self.sig_ctxs;
        let nonce_shares = TxInputParams::from_fn(|input| {
            sig_ctxs.get_mut(input).init_my_nonce_share(keys.for_input(input)).cloned()
        })?;
        self.terms = Some(terms);
        self.my_tx_data = Some(my_tx_data.clone());
        Ok(NonceShareBundle { tx_data: my_tx_data, nonce_shares })
    }

    /// Take the peer's nonce shares and transaction data, build every transaction and bind each signing context to
    /// its message.
    pub fn set_peers_nonce_shares(
        &mut self,
        peers_bundle: NonceShareBundle,
        receivers: &[Receiver],
        redirect_timelock: u16,
    ) -> Result<(), TradeError> {
        let terms = self.terms.ok_or_else(|| TradeError::internal("trade terms are not set"))?;
        let mine = self.my_tx_data.as_ref().ok_or_else(|| TradeError::internal("our tx data is not set"))?;
        let (buyer, seller) =
            if self.role.is_buyer() { (mine, &peers_bundle.tx_data) } else { (&peers_bundle.tx_data, mine) };
        let (p, q) = self.keys.aggregated_keys()?;
        let txs = TradeTransactions::build(&terms, p, q, buyer, seller, receivers, redirect_timelock)?;
        let adaptor_point = self.swap_adaptor_point()?;
        for input in TxInput::ALL {
            let ctx = self.sig_ctxs.get_mut(input);
            ctx.set_peers_nonce_share(peers_bundle.nonce_shares.get(input).clone())?;
            ctx.set_message(input.message(&txs)?);
        }
        self.sig_ctxs.swap_tx_input.set_adaptor_point(adaptor_point);
        trace!("{}: deposit tx {} ready for signing", self.trade_id, txs.deposit.txid());
        self.transactions = Some(txs);
        Ok(())
    }

    /// Sign every input. Our own inputs are kept for aggregation; the bundle carries what the peer needs.
    pub fn sign_partial(&mut self) -> Result<PartialSignatureBundle, ProtocolError> {
        for input in TxInput::ALL {
            self.sig_ctxs.get_mut(input).sign_partial(self.keys.for_input(input))?;
        }
        let ctxs = &self.sig_ctxs;
        let bundle = if self.role.is_buyer() {
            PartialSignatureBundle {
                peers_warning_tx_buyer_input: ctxs.sellers_warning_tx_buyer_input.my_partial_sig()?,
                peers_warning_tx_seller_input: ctxs.sellers_warning_tx_seller_input.my_partial_sig()?,
                peers_redirect_tx_input: ctxs.sellers_redirect_tx_input.my_partial_sig()?,
                swap_tx_input: Some(ctxs.swap_tx_input.my_partial_sig()?),
            }
        } else {
            PartialSignatureBundle {
                peers_warning_tx_buyer_input: ctxs.buyers_warning_tx_buyer_input.my_partial_sig()?,
                peers_warning_tx_seller_input: ctxs.buyers_warning_tx_seller_input.my_partial_sig()?,
                peers_redirect_tx_input: ctxs.buyers_redirect_tx_input.my_partial_sig()?,
                swap_tx_input: Some(ctxs.swap_tx_input.my_partial_sig()?),
            }
        };
        Ok(bundle)
    }

    /// Verify the peer's partial signatures on our warning and redirect transactions and aggregate them into
    /// transactions we can publish alone.
    ///
    /// The buyer also aggregates the swap tx adaptor signature from the seller's adaptor partial signature, if
    /// present. The seller never takes the buyer's swap partial signature here.
    pub fn set_peers_partial_signatures(&mut self, bundle: PartialSignatureBundle) -> Result<&FallbackTxs, TradeError> {
        let txs = self.transactions.as_ref().ok_or_else(|| TradeError::internal("transactions are not built"))?;
        let (warning_buyer, warning_seller, redirect) = if self.role.is_buyer() {
            (TxInput::BuyersWarningBuyerInput, TxInput::BuyersWarningSellerInput, TxInput::BuyersRedirect)
        } else {
            (TxInput::SellersWarningBuyerInput, TxInput::SellersWarningSellerInput, TxInput::SellersRedirect)
        };
        let keys = &self.keys;
        let mut aggregate = |input: TxInput, sig: PartialSignature| -> Result<LiftedSignature, ProtocolError> {
            let ctx = self.sig_ctxs.get_mut(input);
            ctx.set_peers_partial_sig(keys.for_input(input), sig)?;
            ctx.aggregate_partial_signatures(keys.for_input(input))
        };
        let warning_sigs = vec![
            aggregate(warning_buyer, bundle.peers_warning_tx_buyer_input)?,
            aggregate(warning_seller, bundle.peers_warning_tx_seller_input)?,
        ];
        let redirect_sig = aggregate(redirect, bundle.peers_redirect_tx_input)?;

        let (p, q) = keys.aggregated_keys()?;
        let my_key = self.my_output().aggregated_pub_key()?;
        let (warning_tx, _) = warning_buyer.locate(txs);
        let (redirect_tx, _) = redirect.locate(txs);
        let warning_tx = SignedTx::new(warning_tx.clone(), warning_sigs)?;
        warning_tx.verify(&[p, q])?;
        let redirect_tx = SignedTx::new(redirect_tx.clone(), vec![redirect_sig])?;
        redirect_tx.verify(&[my_key])?;

        match (self.role.is_buyer(), bundle.swap_tx_input) {
            (true, Some(sig)) => {
                let ctx = &mut self.sig_ctxs.swap_tx_input;
                ctx.set_peers_partial_sig(&keys.seller_output, sig)?;
                ctx.aggregate_adaptor_signature(&keys.seller_output)?;
                debug!("⚡️ {}: swap tx adaptor signature verified", self.trade_id);
            }
            (true, None) => warn!("{}: the seller withheld its swap tx partial signature", self.trade_id),
            (false, Some(_)) => {
                warn!("{}: ignoring the buyer's swap tx partial signature supplied before the swap", self.trade_id)
            }
            (false, None) => {}
        }
        Ok(self.fallback_txs.insert(FallbackTxs { warning_tx, redirect_tx }))
    }

    /// (Seller) complete the swap tx with the buyer's partial signature and our adaptor secret.
    ///
    /// Returns the signed swap tx. Only once it verifies may our key share for the buyer output be disclosed.
    pub fn sign_swap_tx(&mut self, buyers_partial_sig: PartialSignature) -> Result<&SignedTx, TradeError> {
        let txs = self.transactions.as_ref().ok_or_else(|| TradeError::internal("transactions are not built"))?;
        let adaptor_secret = self.keys.buyer_output.my_key_share().prv_key();
        let seller_output = &self.keys.seller_output;
        let ctx = &mut self.sig_ctxs.swap_tx_input;
        ctx.set_peers_partial_sig(seller_output, buyers_partial_sig)?;
        ctx.aggregate_adaptor_signature(seller_output)?;
        let sig = ctx.adapt(seller_output, adaptor_secret)?;
        let swap_tx = SignedTx::new(txs.swap.clone(), vec![sig])?;
        swap_tx.verify(&[seller_output.aggregated_pub_key()?])?;
        info!("⚡️ {}: swap tx {} signed", self.trade_id, swap_tx.txid());
        Ok(self.swap_tx.insert(swap_tx))
    }

    /// Combine the peer's private key share for our output with ours.
    pub fn accept_peers_prv_key_share(&mut self, peers_share: Scalar) -> Result<Scalar, ProtocolError> {
        let key = self.my_output().reconstruct_prv_key(peers_share)?;
        Ok(*self.my_output_prv_key.insert(key))
    }

    /// (Buyer) extract the seller's key share for the buyer output from the published swap tx.
    pub fn recover_from_swap_tx(&mut self, swap_tx: &SignedTx) -> Result<Scalar, TradeError> {
        let txs = self.transactions.as_ref().ok_or_else(|| TradeError::internal("transactions are not built"))?;
        if swap_tx.tx != txs.swap {
            return Err(TradeError::invalid(format!("{} is not the swap tx of this trade", swap_tx.txid())));
        }
        let sig = swap_tx.witness(0)?;
        let sellers_share = self.sig_ctxs.swap_tx_input.reveal_secret(&self.keys.seller_output, sig)?;
        let key = self.keys.buyer_output.reconstruct_prv_key(sellers_share)?;
        info!("⚡️ {}: recovered the buyer output key from swap tx {}", self.trade_id, swap_tx.txid());
        Ok(*self.my_output_prv_key.insert(key))
    }
}
