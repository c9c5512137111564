use crate::error::ReadError;
use crate::transaction::codec::{read_outpoint, read_output, write_outpoint, write_output};
use crate::transaction::{
    Destination, OutPoint, Reader, TradeTerms, TxError, TxIn, TxOut, UnsignedTx, ANCHOR_AMOUNT, DUST_LIMIT,
    SEQUENCE_RBF,
};
use log::*;
use musig2::secp::Point;
use serde::{Deserialize, Serialize};

/// A wallet-selected coin funding one side of the deposit transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingInput {
    pub outpoint: OutPoint,
    pub value: u64,
}

/// One peer's half of the deposit transaction: the coins it spends and its change output.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct HalfDeposit {
    pub inputs: Vec<FundingInput>,
    pub change: Option<TxOut>,
}

impl HalfDeposit {
    pub fn input_value(&self) -> Result<u64, TxError> {
        self.inputs.iter().try_fold(0u64, |total, i| total.checked_add(i.value)).ok_or(TxError::Overflow)
    }

    pub fn change_value(&self) -> u64 {
        self.change.as_ref().map(|c| c.value).unwrap_or_default()
    }

    /// Check that the half deposit pays `needed` sats (contribution plus fee share) into the deposit transaction.
    pub fn validate(&self, who: &str, needed: u64) -> Result<(), TxError> {
        if self.inputs.is_empty() {
            return Err(TxError::insufficient(format!("{who} half deposit"), needed, 0));
        }
        let available = self.input_value()?.saturating_sub(self.change_value());
        if available < needed {
            return Err(TxError::insufficient(format!("{who} half deposit"), needed, available));
        }
        if let Some(change) = &self.change {
            if change.value < DUST_LIMIT {
                return Err(TxError::dust(format!("{who} change output"), change.value));
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.inputs.len() as u16).to_le_bytes());
        for input in &self.inputs {
            write_outpoint(&mut buf, &input.outpoint);
            buf.extend_from_slice(&input.value.to_le_bytes());
        }
        match &self.change {
            Some(change) => {
                buf.push(1);
                write_output(&mut buf, change);
            }
            None => buf.push(0),
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut reader = Reader::new(bytes);
        let count = reader.read_count("halfDeposit.inputs")?;
        let mut inputs = Vec::with_capacity(count);
        for _ in 0..count {
            let outpoint = read_outpoint(&mut reader)?;
            let value = reader.read_u64("halfDeposit.value")?;
            inputs.push(FundingInput { outpoint, value });
        }
        let change = match reader.read_u8("halfDeposit.change")? {
            0 => None,
            1 => Some(read_output(&mut reader)?),
            other => return Err(ReadError::new("halfDeposit.change", format!("invalid flag {other}"))),
        };
        reader.finish("halfDeposit")?;
        Ok(HalfDeposit { inputs, change })
    }
}

/// A redirect transaction output, e.g. a contributor receiving the funds of an abandoned trade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub address: String,
    pub amount: u64,
}

impl Receiver {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Receiver { address: address.into(), amount }
    }
}

/// Everything one peer contributes to the shared transaction templates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartyTxData {
    pub warning_tx_fee_bump_address: String,
    pub redirect_tx_fee_bump_address: String,
    pub payout_address: String,
    pub half_deposit: HalfDeposit,
}

impl PartyTxData {
    fn validate_addresses(&self) -> Result<(), TxError> {
        for addr in [&self.warning_tx_fee_bump_address, &self.redirect_tx_fee_bump_address, &self.payout_address] {
            if addr.trim().is_empty() {
                return Err(TxError::InvalidAddress("empty address".into()));
            }
        }
        Ok(())
    }
}

/// The six transactions of a trade.
///
/// * The deposit tx locks the buyer output P and the seller output Q.
/// * The swap tx returns Q to the seller. Its signature is adaptor-encrypted so publishing it hands the buyer the
///   seller's key share for P.
/// * Each peer's warning tx sweeps P and Q into a single output locked to that peer's aggregated output key.
/// * Each peer's redirect tx spends its own warning output to the receivers after a relative timelock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeTransactions {
    pub deposit: UnsignedTx,
    pub swap: UnsignedTx,
    pub buyers_warning: UnsignedTx,
    pub sellers_warning: UnsignedTx,
    pub buyers_redirect: UnsignedTx,
    pub sellers_redirect: UnsignedTx,
}

impl TradeTransactions {
    pub fn build(
        terms: &TradeTerms,
        buyer_output_key: Point,
        seller_output_key: Point,
        buyer: &PartyTxData,
        seller: &PartyTxData,
        receivers: &[Receiver],
        redirect_timelock: u16,
    ) -> Result<Self, TxError> {
        buyer.validate_addresses()?;
        seller.validate_addresses()?;
        buyer.half_deposit.validate("buyer", terms.half_deposit_amount(true)?)?;
        seller.half_deposit.validate("seller", terms.half_deposit_amount(false)?)?;

        let inputs = buyer
            .half_deposit
            .inputs
            .iter()
            .chain(seller.half_deposit.inputs.iter())
            .map(|i| TxIn { prev_out: i.outpoint, sequence: SEQUENCE_RBF })
            .collect();
        let mut outputs = vec![
            TxOut { value: terms.buyer_output_value()?, destination: Destination::key(buyer_output_key) },
            TxOut { value: terms.seller_output_value(), destination: Destination::key(seller_output_key) },
        ];
        outputs.extend(buyer.half_deposit.change.iter().cloned());
        outputs.extend(seller.half_deposit.change.iter().cloned());
        let deposit = UnsignedTx::new(inputs, outputs);
        let deposit_txid = deposit.txid();
        let p = OutPoint { txid: deposit_txid, vout: 0 };
        let q = OutPoint { txid: deposit_txid, vout: 1 };

        let buyers_warning = warning_tx(terms, p, q, buyer_output_key, &buyer.warning_tx_fee_bump_address)?;
        let sellers_warning = warning_tx(terms, p, q, seller_output_key, &seller.warning_tx_fee_bump_address)?;
        let buyers_redirect =
            redirect_tx(terms, &buyers_warning, receivers, &buyer.redirect_tx_fee_bump_address, redirect_timelock)?;
        let sellers_redirect =
            redirect_tx(terms, &sellers_warning, receivers, &seller.redirect_tx_fee_bump_address, redirect_timelock)?;
        let swap = UnsignedTx::new(
            vec![TxIn { prev_out: q, sequence: SEQUENCE_RBF }],
            vec![TxOut {
                value: terms.swap_output_value()?,
                destination: Destination::Address(seller.payout_address.clone()),
            }],
        );
        debug!("⚡️ Built trade transactions. Deposit txid {deposit_txid}");
        Ok(TradeTransactions { deposit, swap, buyers_warning, sellers_warning, buyers_redirect, sellers_redirect })
    }
}

fn warning_tx(terms: &TradeTerms, p: OutPoint, q: OutPoint, owner: Point, fee_bump: &str) -> Result<UnsignedTx, TxError> {
    Ok(UnsignedTx::new(
        vec![TxIn { prev_out: p, sequence: SEQUENCE_RBF }, TxIn { prev_out: q, sequence: SEQUENCE_RBF }],
        vec![
            TxOut { value: terms.warning_output_value()?, destination: Destination::key(owner) },
            TxOut { value: ANCHOR_AMOUNT, destination: Destination::Address(fee_bump.to_string()) },
        ],
    ))
}

fn redirect_tx(
    terms: &TradeTerms,
    warning: &UnsignedTx,
    receivers: &[Receiver],
    fee_bump: &str,
    timelock: u16,
) -> Result<UnsignedTx, TxError> {
    if receivers.is_empty() {
        return Err(TxError::NoReceivers);
    }
    let mut outputs = Vec::with_capacity(receivers.len() + 1);
    let mut total = 0u64;
    for receiver in receivers {
        if receiver.address.trim().is_empty() {
            return Err(TxError::InvalidAddress("empty receiver address".into()));
        }
        if receiver.amount < DUST_LIMIT {
            return Err(TxError::dust(format!("redirect output to {}", receiver.address), receiver.amount));
        }
        total = total.checked_add(receiver.amount).ok_or(TxError::Overflow)?;
        outputs.push(TxOut { value: receiver.amount, destination: Destination::Address(receiver.address.clone()) });
    }
    outputs.push(TxOut { value: ANCHOR_AMOUNT, destination: Destination::Address(fee_bump.to_string()) });
    let fee = terms.redirect_fee(receivers.len())?;
    let needed = total.checked_add(ANCHOR_AMOUNT).and_then(|v| v.checked_add(fee)).ok_or(TxError::Overflow)?;
    let available = terms.warning_output_value()?;
    if needed > available {
        return Err(TxError::insufficient("redirect tx", needed, available));
    }
    let input = TxIn { prev_out: warning.outpoint(0), sequence: u32::from(timelock) };
    Ok(UnsignedTx::new(vec![input], outputs))
}
