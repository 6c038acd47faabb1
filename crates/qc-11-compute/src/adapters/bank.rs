//! # In-Memory Bank
//!
//! Account/funds module keeping balances and accounts in the ledger store,
//! so they follow the same transactions as contract state.

use crate::domain::value_objects::{Address, Coins, U256};
use crate::errors::{BankError, StoreError};
use crate::ports::outbound::{Bank, LedgerStore};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Balance records: `0x20 ++ address ++ denom`.
pub const BALANCE_PREFIX: u8 = 0x20;
/// Account markers: `0x21 ++ address`.
pub const ACCOUNT_PREFIX: u8 = 0x21;

fn balance_key(address: &Address, denom: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + Address::LEN + denom.len());
    key.push(BALANCE_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key.extend_from_slice(denom.as_bytes());
    key
}

fn account_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + Address::LEN);
    key.push(ACCOUNT_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

/// Ledger-backed bank.
pub struct InMemoryBank {
    store: Arc<dyn LedgerStore>,
    blocked: RwLock<HashSet<Address>>,
}

impl InMemoryBank {
    /// Bank over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            blocked: RwLock::new(HashSet::new()),
        }
    }

    /// Credits `amount` to `address`, creating the account if needed.
    pub fn mint(&self, address: &Address, amount: &Coins) -> Result<(), BankError> {
        for coin in amount.iter() {
            let balance = self.balance(address, &coin.denom)?;
            self.set_balance(address, &coin.denom, balance.saturating_add(coin.amount))?;
        }
        self.touch(address)
    }

    /// Forbids `address` from sending funds.
    pub fn block(&self, address: Address) {
        self.blocked.write().insert(address);
    }

    fn set_balance(&self, address: &Address, denom: &str, amount: U256) -> Result<(), BankError> {
        let mut bytes = [0u8; 32];
        amount.to_big_endian(&mut bytes);
        self.store.set(&balance_key(address, denom), &bytes)?;
        Ok(())
    }

    fn touch(&self, address: &Address) -> Result<(), BankError> {
        self.store.set(&account_key(address), &[1])?;
        Ok(())
    }
}

impl Bank for InMemoryBank {
    fn send_funds(&self, from: &Address, to: &Address, amount: &Coins) -> Result<(), BankError> {
        for coin in amount.iter() {
            let available = self.balance(from, &coin.denom)?;
            if available < coin.amount {
                return Err(BankError::InsufficientFunds {
                    address: from.to_string(),
                    denom: coin.denom.clone(),
                    required: coin.amount.to_string(),
                    available: available.to_string(),
                });
            }
            self.set_balance(from, &coin.denom, available - coin.amount)?;
            let received = self.balance(to, &coin.denom)?;
            self.set_balance(to, &coin.denom, received.saturating_add(coin.amount))?;
        }
        self.touch(to)?;
        debug!(%from, %to, %amount, "Sent funds");
        Ok(())
    }

    fn is_blocked(&self, address: &Address) -> bool {
        self.blocked.read().contains(address)
    }

    fn account_exists(&self, address: &Address) -> Result<bool, BankError> {
        Ok(self.store.has(&account_key(address))?)
    }

    fn create_account(&self, address: &Address) -> Result<(), BankError> {
        if self.account_exists(address)? {
            return Err(BankError::AccountExists(address.to_string()));
        }
        self.touch(address)
    }

    fn balance(&self, address: &Address, denom: &str) -> Result<U256, BankError> {
        match self.store.get(&balance_key(address, denom))? {
            None => Ok(U256::zero()),
            Some(bytes) if bytes.len() == 32 => Ok(U256::from_big_endian(&bytes)),
            Some(_) => Err(BankError::Store(StoreError::Corrupted(format!(
                "balance of {address} in {denom}"
            )))),
        }
    }
}

impl std::fmt::Debug for InMemoryBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBank")
            .field("blocked", &self.blocked.read().len())
            .finish_non_exhaustive()
    }
}
