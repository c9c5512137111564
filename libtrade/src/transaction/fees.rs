use crate::transaction::TxError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const DUST_LIMIT: u64 = 546;
/// Value of the fee-bump anchor output on warning and redirect transactions.
pub const ANCHOR_AMOUNT: u64 = 330;

// Virtual sizes used to price each transaction. Each peer pays half of the deposit transaction fee.
pub const DEPOSIT_TX_VSIZE: u64 = 280;
pub const WARNING_TX_VSIZE: u64 = 208;
pub const SWAP_TX_VSIZE: u64 = 111;
pub const REDIRECT_TX_BASE_VSIZE: u64 = 99;
pub const REDIRECT_TX_OUTPUT_VSIZE: u64 = 43;

/// Fee rate in sats per virtual byte.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeRate(f64);

impl FeeRate {
    pub fn new(sats_per_vbyte: f64) -> Result<Self, TxError> {
        if sats_per_vbyte.is_finite() && sats_per_vbyte > 0.0 {
            Ok(FeeRate(sats_per_vbyte))
        } else {
            Err(TxError::InvalidFeeRate(sats_per_vbyte))
        }
    }

    pub fn sats_per_vbyte(&self) -> f64 {
        self.0
    }

    /// The fee for a transaction of `vsize` virtual bytes, rounded up to the next sat.
    pub fn fee_for(&self, vsize: u64) -> Result<u64, TxError> {
        let fee = (self.0 * vsize as f64).ceil();
        // `u64::MAX as f64` rounds up to 2^64, the first value that does not fit
        if fee >= u64::MAX as f64 {
            return Err(TxError::Overflow);
        }
        Ok(fee as u64)
    }
}

impl Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

/// The economic terms of a trade, fixed when nonce shares are exchanged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeTerms {
    pub trade_amount: u64,
    pub buyers_security_deposit: u64,
    pub sellers_security_deposit: u64,
    pub deposit_tx_fee_rate: FeeRate,
    pub prepared_tx_fee_rate: FeeRate,
}

impl TradeTerms {
    pub fn new(
        trade_amount: u64,
        buyers_security_deposit: u64,
        sellers_security_deposit: u64,
        deposit_tx_fee_rate: f64,
        prepared_tx_fee_rate: f64,
    ) -> Result<Self, TxError> {
        if trade_amount == 0 {
            return Err(TxError::ZeroAmount("tradeAmount"));
        }
        if buyers_security_deposit == 0 {
            return Err(TxError::ZeroAmount("buyersSecurityDeposit"));
        }
        if sellers_security_deposit == 0 {
            return Err(TxError::ZeroAmount("sellersSecurityDeposit"));
        }
        let terms = TradeTerms {
            trade_amount,
            buyers_security_deposit,
            sellers_security_deposit,
            deposit_tx_fee_rate: FeeRate::new(deposit_tx_fee_rate)?,
            prepared_tx_fee_rate: FeeRate::new(prepared_tx_fee_rate)?,
        };
        // Overflow and dust are checked up front so every later template can use plain arithmetic
        let total = terms.buyer_output_value()?.checked_add(terms.seller_output_value()).ok_or(TxError::Overflow)?;
        terms.half_deposit_amount(true)?;
        terms.half_deposit_amount(false)?;
        if terms.seller_output_value() < DUST_LIMIT {
            return Err(TxError::dust("seller output", terms.seller_output_value()));
        }
        let warning_value = terms.warning_output_value()?;
        if warning_value < DUST_LIMIT {
            return Err(TxError::dust("warning output", warning_value));
        }
        let swap_value = terms.swap_output_value()?;
        if swap_value < DUST_LIMIT {
            return Err(TxError::dust("swap output", swap_value));
        }
        log::trace!("Trade terms accepted. Deposit total {total} sats");
        Ok(terms)
    }

    /// Buyer output (P): the buyer's security deposit plus the traded amount.
    pub fn buyer_output_value(&self) -> Result<u64, TxError> {
        self.buyers_security_deposit.checked_add(self.trade_amount).ok_or(TxError::Overflow)
    }

    /// Seller output (Q): the seller's security deposit.
    pub fn seller_output_value(&self) -> u64 {
        self.sellers_security_deposit
    }

    /// Each peer's share of the deposit transaction fee.
    pub fn half_deposit_fee(&self) -> Result<u64, TxError> {
        Ok(self.deposit_tx_fee_rate.fee_for(DEPOSIT_TX_VSIZE)?.div_ceil(2))
    }

    /// What a peer puts into the deposit transaction before its share of the fee. The seller funds the traded
    /// amount.
    pub fn contribution(&self, buyer: bool) -> Result<u64, TxError> {
        if buyer {
            Ok(self.buyers_security_deposit)
        } else {
            self.sellers_security_deposit.checked_add(self.trade_amount).ok_or(TxError::Overflow)
        }
    }

    /// What a peer's half deposit must pay in: its contribution plus its share of the deposit tx fee.
    pub fn half_deposit_amount(&self, buyer: bool) -> Result<u64, TxError> {
        self.contribution(buyer)?.checked_add(self.half_deposit_fee()?).ok_or(TxError::Overflow)
    }

    pub fn warning_fee(&self) -> Result<u64, TxError> {
        self.prepared_tx_fee_rate.fee_for(WARNING_TX_VSIZE)
    }

    /// Value locked by a warning transaction, after its fee and fee-bump anchor.
    pub fn warning_output_value(&self) -> Result<u64, TxError> {
        let total = self.buyer_output_value()?.checked_add(self.seller_output_value()).ok_or(TxError::Overflow)?;
        let spend = self.warning_fee()?.checked_add(ANCHOR_AMOUNT).ok_or(TxError::Overflow)?;
        total.checked_sub(spend).ok_or_else(|| TxError::insufficient("warning tx", spend, total))
    }

    pub fn redirect_fee(&self, receivers: usize) -> Result<u64, TxError> {
        let vsize = (receivers as u64 + 1)
            .checked_mul(REDIRECT_TX_OUTPUT_VSIZE)
            .and_then(|v| v.checked_add(REDIRECT_TX_BASE_VSIZE))
            .ok_or(TxError::Overflow)?;
        self.prepared_tx_fee_rate.fee_for(vsize)
    }

    pub fn swap_output_value(&self) -> Result<u64, TxError> {
        let fee = self.prepared_tx_fee_rate.fee_for(SWAP_TX_VSIZE)?;
        let value = self.seller_output_value();
        value.checked_sub(fee).ok_or_else(|| TxError::insufficient("swap tx", fee, value))
    }
}
