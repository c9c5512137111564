//! Request and response types of the coordinator API. Byte fields are hex encoded so the messages can be relayed
//! between peers as JSON.
use libtrade::multisig::{read_partial_sig, read_point, read_pub_nonce, read_scalar, PartialSignature, PubNonce};
use libtrade::state_machine::ClosureKind;
use libtrade::trade_model::{NonceShareBundle, PartialSignatureBundle, TxInputParams};
use libtrade::transaction::{HalfDeposit, PartyTxData, Receiver, TradeTerms, TxError};
use libtrade::{ReadError, TradeRole};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitTradeRequest {
    pub trade_id: String,
    pub role: TradeRole,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitTradeResponse {
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub buyer_output_pub_key_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub seller_output_pub_key_share: Vec<u8>,
    pub current_block_height: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NonceSharesRequest {
    pub trade_id: String,
    /// The peer's key share for the buyer output, from its [`InitTradeResponse`]
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub buyer_output_peers_pub_key_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub seller_output_peers_pub_key_share: Vec<u8>,
    /// sats/vB
    pub deposit_tx_fee_rate: f64,
    pub prepared_tx_fee_rate: f64,
    pub trade_amount: u64,
    pub buyers_security_deposit: u64,
    pub sellers_security_deposit: u64,
}

impl NonceSharesRequest {
    pub fn terms(&self) -> Result<TradeTerms, TxError> {
        TradeTerms::new(
            self.trade_amount,
            self.buyers_security_deposit,
            self.sellers_security_deposit,
            self.deposit_tx_fee_rate,
            self.prepared_tx_fee_rate,
        )
    }
}

/// One peer's nonce shares and transaction data. Returned by `GetNonceShares` and handed to the other peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NonceSharesMessage {
    pub warning_tx_fee_bump_address: String,
    pub redirect_tx_fee_bump_address: String,
    pub payout_address: String,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub half_deposit_psbt: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub swap_tx_input_nonce_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub buyers_warning_tx_buyer_input_nonce_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub buyers_warning_tx_seller_input_nonce_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub sellers_warning_tx_buyer_input_nonce_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub sellers_warning_tx_seller_input_nonce_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub buyers_redirect_tx_input_nonce_share: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub sellers_redirect_tx_input_nonce_share: Vec<u8>,
}

impl From<&NonceShareBundle> for NonceSharesMessage {
    fn from(bundle: &NonceShareBundle) -> Self {
        let nonce = |n: &PubNonce| n.serialize().to_vec();
        let shares = &bundle.nonce_shares;
        NonceSharesMessage {
            warning_tx_fee_bump_address: bundle.tx_data.warning_tx_fee_bump_address.clone(),
            redirect_tx_fee_bump_address: bundle.tx_data.redirect_tx_fee_bump_address.clone(),
            payout_address: bundle.tx_data.payout_address.clone(),
            half_deposit_psbt: bundle.tx_data.half_deposit.to_bytes(),
            swap_tx_input_nonce_share: nonce(&shares.swap_tx_input),
            buyers_warning_tx_buyer_input_nonce_share: nonce(&shares.buyers_warning_tx_buyer_input),
            buyers_warning_tx_seller_input_nonce_share: nonce(&shares.buyers_warning_tx_seller_input),
            sellers_warning_tx_buyer_input_nonce_share: nonce(&shares.sellers_warning_tx_buyer_input),
            sellers_warning_tx_seller_input_nonce_share: nonce(&shares.sellers_warning_tx_seller_input),
            buyers_redirect_tx_input_nonce_share: nonce(&shares.buyers_redirect_tx_input),
            sellers_redirect_tx_input_nonce_share: nonce(&shares.sellers_redirect_tx_input),
        }
    }
}

impl TryFrom<&NonceSharesMessage> for NonceShareBundle {
    type Error = ReadError;

    fn try_from(msg: &NonceSharesMessage) -> Result<Self, Self::Error> {
        let nonce_shares = TxInputParams {
            swap_tx_input: read_pub_nonce("swapTxInputNonceShare", &msg.swap_tx_input_nonce_share)?,
            buyers_warning_tx_buyer_input: read_pub_nonce(
                "buyersWarningTxBuyerInputNonceShare",
                &msg.buyers_warning_tx_buyer_input_nonce_share,
            )?,
            buyers_warning_tx_seller_input: read_pub_nonce(
                "buyersWarningTxSellerInputNonceShare",
                &msg.buyers_warning_tx_seller_input_nonce_share,
            )?,
            sellers_warning_tx_buyer_input: read_pub_nonce(
                "sellersWarningTxBuyerInputNonceShare",
                &msg.sellers_warning_tx_buyer_input_nonce_share,
            )?,
            sellers_warning_tx_seller_input: read_pub_nonce(
                "sellersWarningTxSellerInputNonceShare",
                &msg.sellers_warning_tx_seller_input_nonce_share,
            )?,
            buyers_redirect_tx_input: read_pub_nonce(
                "buyersRedirectTxInputNonceShare",
                &msg.buyers_redirect_tx_input_nonce_share,
            )?,
            sellers_redirect_tx_input: read_pub_nonce(
                "sellersRedirectTxInputNonceShare",
                &msg.sellers_redirect_tx_input_nonce_share,
            )?,
        };
        let tx_data = PartyTxData {
            warning_tx_fee_bump_address: msg.warning_tx_fee_bump_address.clone(),
            redirect_tx_fee_bump_address: msg.redirect_tx_fee_bump_address.clone(),
            payout_address: msg.payout_address.clone(),
            half_deposit: HalfDeposit::from_bytes(&msg.half_deposit_psbt)?,
        };
        Ok(NonceShareBundle { tx_data, nonce_shares })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartialSignaturesRequest {
    pub trade_id: String,
    pub peers_nonce_shares: NonceSharesMessage,
    pub receivers: Vec<Receiver>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignaturesMessage {
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub peers_warning_tx_buyer_input_partial_signature: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub peers_warning_tx_seller_input_partial_signature: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub peers_redirect_tx_input_partial_signature: Vec<u8>,
    /// Withheld by the buyer until the deposit is confirmed
    #[serde(
        default,
        serialize_with = "libtrade::helpers::option_to_hex",
        deserialize_with = "libtrade::helpers::option_from_hex"
    )]
    pub swap_tx_input_partial_signature: Option<Vec<u8>>,
}

impl PartialSignaturesMessage {
    /// The message without the swap tx partial signature.
    pub fn redacted(&self) -> Self {
        PartialSignaturesMessage { swap_tx_input_partial_signature: None, ..self.clone() }
    }
}

impl From<&PartialSignatureBundle> for PartialSignaturesMessage {
    fn from(bundle: &PartialSignatureBundle) -> Self {
        let sig = |s: &PartialSignature| s.serialize().to_vec();
        PartialSignaturesMessage {
            peers_warning_tx_buyer_input_partial_signature: sig(&bundle.peers_warning_tx_buyer_input),
            peers_warning_tx_seller_input_partial_signature: sig(&bundle.peers_warning_tx_seller_input),
            peers_redirect_tx_input_partial_signature: sig(&bundle.peers_redirect_tx_input),
            swap_tx_input_partial_signature: bundle.swap_tx_input.as_ref().map(sig),
        }
    }
}

impl TryFrom<&PartialSignaturesMessage> for PartialSignatureBundle {
    type Error = ReadError;

    fn try_from(msg: &PartialSignaturesMessage) -> Result<Self, Self::Error> {
        Ok(PartialSignatureBundle {
            peers_warning_tx_buyer_input: read_partial_sig(
                "peersWarningTxBuyerInputPartialSignature",
                &msg.peers_warning_tx_buyer_input_partial_signature,
            )?,
            peers_warning_tx_seller_input: read_partial_sig(
                "peersWarningTxSellerInputPartialSignature",
                &msg.peers_warning_tx_seller_input_partial_signature,
            )?,
            peers_redirect_tx_input: read_partial_sig(
                "peersRedirectTxInputPartialSignature",
                &msg.peers_redirect_tx_input_partial_signature,
            )?,
            swap_tx_input: msg
                .swap_tx_input_partial_signature
                .as_deref()
                .map(|b| read_partial_sig("swapTxInputPartialSignature", b))
                .transpose()?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositTxSignatureRequest {
    pub trade_id: String,
    pub peers_partial_signatures: PartialSignaturesMessage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPsbt {
    pub deposit_txid: String,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub deposit_psbt: Vec<u8>,
    /// Our fully signed warning tx, kept in case the peer disappears
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub warning_tx: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub redirect_tx: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishDepositTxRequest {
    pub trade_id: String,
}

/// An update on the deposit tx, streamed after publishing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxConfirmationStatus {
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub tx: Vec<u8>,
    pub current_block_height: u64,
    pub num_confirmations: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapTxSignatureRequest {
    pub trade_id: String,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub swap_tx_input_peers_partial_signature: Vec<u8>,
}

impl SwapTxSignatureRequest {
    pub fn partial_signature(&self) -> Result<PartialSignature, ReadError> {
        read_partial_sig("swapTxInputPeersPartialSignature", &self.swap_tx_input_peers_partial_signature)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapTxSignatureResponse {
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub swap_tx: Vec<u8>,
    #[serde(serialize_with = "libtrade::helpers::to_hex", deserialize_with = "libtrade::helpers::from_hex")]
    pub peer_output_prv_key_share: Vec<u8>,
}

/// Supply the peer's key share for a cooperative close, the observed swap tx, or neither for a forced close.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CloseTradeRequest {
    pub trade_id: String,
    #[serde(
        default,
        serialize_with = "libtrade::helpers::option_to_hex",
        deserialize_with = "libtrade::helpers::option_from_hex"
    )]
    pub my_output_peers_prv_key_share: Option<Vec<u8>>,
    #[serde(
        default,
        serialize_with = "libtrade::helpers::option_to_hex",
        deserialize_with = "libtrade::helpers::option_from_hex"
    )]
    pub swap_tx: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloseTradeResponse {
    pub outcome: ClosureKind,
    /// Our key share for the peer's output, when the close allows handing it over
    #[serde(
        default,
        serialize_with = "libtrade::helpers::option_to_hex",
        deserialize_with = "libtrade::helpers::option_from_hex"
    )]
    pub peer_output_prv_key_share: Option<Vec<u8>>,
    /// The full spending key of our own output, when the close revealed the peer's share of it. The session holding
    /// it may be archived right after, so this is the caller's only copy.
    #[serde(
        default,
        serialize_with = "libtrade::helpers::option_to_hex",
        deserialize_with = "libtrade::helpers::option_from_hex"
    )]
    pub my_output_prv_key: Option<Vec<u8>>,
    /// Transactions the coordinator broadcast to enforce the outcome
    pub published_txids: Vec<String>,
}

pub(crate) fn peer_key_shares(
    req: &NonceSharesRequest,
) -> Result<(libtrade::multisig::Point, libtrade::multisig::Point), ReadError> {
    let p = read_point("buyerOutputPeersPubKeyShare", &req.buyer_output_peers_pub_key_share)?;
    let q = read_point("sellerOutputPeersPubKeyShare", &req.seller_output_peers_pub_key_share)?;
    Ok((p, q))
}

pub(crate) fn prv_key_share(bytes: &[u8]) -> Result<libtrade::multisig::Scalar, ReadError> {
    read_scalar("myOutputPeersPrvKeyShare", bytes)
}
