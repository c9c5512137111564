//! The wallet boundary. Coin selection, addresses and deposit input signing belong to the wallet; the trade only
//! needs a funded half deposit and a few addresses.
use crate::error::TradeError;
use crate::role::TradeRole;
use crate::transaction::{HalfDeposit, PartyTxData, TradeTerms};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressPurpose {
    WarningTxFeeBump,
    RedirectTxFeeBump,
    Payout,
    Change,
}

pub trait TradeWallet {
    type Error: std::error::Error;

    fn new_address(&mut self, purpose: AddressPurpose) -> Result<String, Self::Error>;

    /// Select coins worth at least `amount` sats, returning any change to the wallet.
    fn fund_half_deposit(&mut self, amount: u64) -> Result<HalfDeposit, Self::Error>;

    /// Return the coins of a half deposit that never made it into a trade.
    fn release_half_deposit(&mut self, half_deposit: &HalfDeposit);
}

/// Gather everything this peer contributes to the trade transactions from its wallet.
pub fn party_tx_data<W: TradeWallet>(
    wallet: &mut W,
    terms: &TradeTerms,
    role: TradeRole,
) -> Result<PartyTxData, TradeError> {
    let wallet_err = |e: W::Error| TradeError::precondition(format!("Wallet error: {e}"));
    let amount = terms.half_deposit_amount(role.is_buyer())?;
    let half_deposit = wallet.fund_half_deposit(amount).map_err(wallet_err)?;
    Ok(PartyTxData {
        warning_tx_fee_bump_address: wallet.new_address(AddressPurpose::WarningTxFeeBump).map_err(wallet_err)?,
        redirect_tx_fee_bump_address: wallet.new_address(AddressPurpose::RedirectTxFeeBump).map_err(wallet_err)?,
        payout_address: wallet.new_address(AddressPurpose::Payout).map_err(wallet_err)?,
        half_deposit,
    })
}

#[cfg(feature = "dummy_wallet")]
pub use dummy::{DummyWalletError, InMemoryWallet};

#[cfg(feature = "dummy_wallet")]
mod dummy {
    use super::{AddressPurpose, TradeWallet};
    use crate::transaction::{Destination, FundingInput, HalfDeposit, OutPoint, TxOut, Txid, DUST_LIMIT};
    use blake2::{Blake2s256, Digest};
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum DummyWalletError {
        #[error("Wallet holds {available} sats but {needed} are needed")]
        InsufficientFunds { needed: u64, available: u64 },
    }

    /// A wallet holding a fixed set of made-up coins.
    pub struct InMemoryWallet {
        label: String,
        next_index: u32,
        coins: Vec<FundingInput>,
    }

    impl InMemoryWallet {
        pub fn new(label: impl Into<String>, coin_values: &[u64]) -> Self {
            let label = label.into();
            let coins = coin_values
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let mut hasher = Blake2s256::new();
                    hasher.update(label.as_bytes());
                    hasher.update((i as u32).to_le_bytes());
                    let txid = Txid::from(<[u8; 32]>::from(hasher.finalize()));
                    FundingInput { outpoint: OutPoint { txid, vout: 0 }, value: *value }
                })
                .collect();
            InMemoryWallet { label, next_index: 0, coins }
        }

        pub fn balance(&self) -> u64 {
            self.coins.iter().fold(0u64, |total, c| total.saturating_add(c.value))
        }

        fn next_address(&mut self, purpose: AddressPurpose) -> String {
            self.next_index += 1;
            format!("{}-{purpose:?}-{}", self.label, self.next_index).to_lowercase()
        }
    }

    impl TradeWallet for InMemoryWallet {
        type Error = DummyWalletError;

        fn new_address(&mut self, purpose: AddressPurpose) -> Result<String, Self::Error> {
            Ok(self.next_address(purpose))
        }

        fn fund_half_deposit(&mut self, amount: u64) -> Result<HalfDeposit, Self::Error> {
            let available = self.balance();
            if available < amount {
                return Err(DummyWalletError::InsufficientFunds { needed: amount, available });
            }
            self.coins.sort_by_key(|c| std::cmp::Reverse(c.value));
            let mut inputs = Vec::new();
            let mut total = 0;
            while total < amount {
                let coin = self.coins.remove(0);
                total = total.saturating_add(coin.value);
                inputs.push(coin);
            }
            let change = match total - amount {
                v if v >= DUST_LIMIT => {
                    Some(TxOut { value: v, destination: Destination::Address(self.next_address(AddressPurpose::Change)) })
                }
                // Too small to be worth an output; it tops up the fee
                _ => None,
            };
            Ok(HalfDeposit { inputs, change })
        }

        fn release_half_deposit(&mut self, half_deposit: &HalfDeposit) {
            for coin in &half_deposit.inputs {
                if !self.coins.contains(coin) {
                    self.coins.push(coin.clone());
                }
            }
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn coin_selection() {
            let mut wallet = InMemoryWallet::new("buyer", &[10_000, 40_000, 5_000]);
            let half = wallet.fund_half_deposit(31_750).unwrap();
            assert_eq!(half.inputs.len(), 1);
            assert_eq!(half.change_value(), 8_250);
            half.validate("buyer", 31_750).unwrap();
            // Dust change is dropped
            let half = wallet.fund_half_deposit(14_900).unwrap();
            assert_eq!(half.input_value().unwrap(), 15_000);
            assert!(half.change.is_none());
            assert!(matches!(wallet.fund_half_deposit(1), Err(DummyWalletError::InsufficientFunds { .. })));
        }

        #[test]
        fn released_coins_can_be_spent_again() {
            let mut wallet = InMemoryWallet::new("buyer", &[50_000]);
            let half = wallet.fund_half_deposit(31_750).unwrap();
            assert_eq!(wallet.balance(), 0);
            wallet.release_half_deposit(&half);
            wallet.release_half_deposit(&half);
            assert_eq!(wallet.balance(), 50_000);
            let again = wallet.fund_half_deposit(31_750).unwrap();
            assert_eq!(again.inputs, half.inputs);
        }

        #[test]
        fn addresses_are_unique() {
            let mut wallet = InMemoryWallet::new("Seller", &[]);
            let a = wallet.new_address(AddressPurpose::Payout).unwrap();
            let b = wallet.new_address(AddressPurpose::Payout).unwrap();
            assert_ne!(a, b);
            assert_eq!(a, "seller-payout-1");
        }
    }
}
