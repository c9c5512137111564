//! Minimal transaction model for the trade protocol.
//!
//! Transactions are deterministic functions of the trade terms and both peers' contributions, so each peer builds
//! every transaction independently and both arrive at identical sighashes. PSBT construction and wallet input
//! signing are the wallet's business; here a deposit input only carries its outpoint and value.
mod codec;
mod error;
mod fees;
pub(crate) mod templates;

pub use codec::Reader;
pub use error::TxError;
pub use fees::{
    FeeRate, TradeTerms, ANCHOR_AMOUNT, DEPOSIT_TX_VSIZE, DUST_LIMIT, REDIRECT_TX_BASE_VSIZE, REDIRECT_TX_OUTPUT_VSIZE,
    SWAP_TX_VSIZE, WARNING_TX_VSIZE,
};
pub use templates::{FundingInput, HalfDeposit, PartyTxData, Receiver, TradeTransactions};

use crate::error::ReadError;
use blake2::{Blake2s256, Digest};
use musig2::secp::Point;
use musig2::LiftedSignature;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Sequence number that opts in to replace-by-fee without enabling a relative timelock.
pub const SEQUENCE_RBF: u32 = 0xffff_fffd;
pub const TX_VERSION: u32 = 2;

const TXID_TAG: &[u8] = b"trade-settlement/txid";
const SIGHASH_TAG: &[u8] = b"trade-settlement/sighash";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Txid(
    #[serde(serialize_with = "crate::helpers::array_to_hex", deserialize_with = "crate::helpers::array_from_hex")]
    [u8; 32],
);

impl From<[u8; 32]> for Txid {
    fn from(bytes: [u8; 32]) -> Self {
        Txid(bytes)
    }
}

impl Txid {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for Txid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub prev_out: OutPoint,
    /// Doubles as a relative timelock (in blocks) when below 2^16.
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// A taproot-style output locked to a (usually aggregated) public key, serialized in compressed form.
    Key([u8; 33]),
    /// An address supplied by a wallet. Opaque here.
    Address(String),
}

impl Destination {
    pub fn key(point: Point) -> Self {
        Destination::Key(point.serialize())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub destination: Destination,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTx {
    pub version: u32,
    pub lock_time: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl UnsignedTx {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        UnsignedTx { version: TX_VERSION, lock_time: 0, inputs, outputs }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + 40 * self.inputs.len() + 48 * self.outputs.len());
        codec::write_tx(&mut buf, self);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut reader = Reader::new(bytes);
        let tx = codec::read_tx(&mut reader)?;
        reader.finish("UnsignedTx")?;
        Ok(tx)
    }

    pub fn txid(&self) -> Txid {
        let mut hasher = Blake2s256::new();
        hasher.update(TXID_TAG);
        hasher.update(self.to_bytes());
        Txid(hasher.finalize().into())
    }

    pub fn outpoint(&self, vout: u32) -> OutPoint {
        OutPoint { txid: self.txid(), vout }
    }

    /// The message signed for the input at `index`. It commits to the whole transaction and the input position.
    pub fn sighash(&self, index: usize) -> Result<[u8; 32], TxError> {
        if index >= self.inputs.len() {
            return Err(TxError::InputOutOfRange(index));
        }
        let mut hasher = Blake2s256::new();
        hasher.update(SIGHASH_TAG);
        hasher.update(self.to_bytes());
        hasher.update((index as u32).to_le_bytes());
        Ok(hasher.finalize().into())
    }
}

/// A transaction with one aggregated Schnorr signature per input.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedTx {
    pub tx: UnsignedTx,
    pub witnesses: Vec<LiftedSignature>,
}

impl SignedTx {
    pub fn new(tx: UnsignedTx, witnesses: Vec<LiftedSignature>) -> Result<Self, TxError> {
        if witnesses.len() != tx.inputs.len() {
            return Err(TxError::WitnessCount { expected: tx.inputs.len(), got: witnesses.len() });
        }
        Ok(SignedTx { tx, witnesses })
    }

    pub fn txid(&self) -> Txid {
        self.tx.txid()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.tx.to_bytes();
        codec::write_witnesses(&mut buf, &self.witnesses);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        let mut reader = Reader::new(bytes);
        let tx = codec::read_tx(&mut reader)?;
        let witnesses = codec::read_witnesses(&mut reader)?;
        reader.finish("SignedTx")?;
        SignedTx::new(tx, witnesses)
    }

    pub fn witness(&self, index: usize) -> Result<LiftedSignature, TxError> {
        self.witnesses.get(index).copied().ok_or(TxError::MissingWitness(index))
    }

    /// Check every witness against the given public keys, in input order.
    pub fn verify(&self, keys: &[Point]) -> Result<(), TxError> {
        for (index, (sig, key)) in self.witnesses.iter().zip(keys).enumerate() {
            let message = self.tx.sighash(index)?;
            musig2::verify_single(*key, *sig, message).map_err(|_| TxError::InvalidWitness(index))?;
        }
        Ok(())
    }
}
