//! Account balances.
//! - `Bank` trait: the bank collaborator the keeper and bankers talk to
//! - `KvBank`: balances persisted as bincode(Coins) under `bal/<addr>`
//!
//! `send_coins` only moves value; it never creates or destroys it.

use crate::storage::KvStore;
use crate::types::{Address, Coins, CoinsError};
use std::sync::Arc;
use thiserror::Error;

const BALANCE_PREFIX: &str = "bal/";

#[derive(Debug, Error)]
pub enum BankError {
    #[error("insufficient coins error: {address} has {have}{denom}, needs {want}{denom}")]
    InsufficientCoins { address: Address, denom: String, have: u64, want: u64 },

    #[error("invalid coins: {0}")]
    InvalidCoins(CoinsError),

    #[error("bank store failure: {0}")]
    Store(#[from] anyhow::Error),
}

/// Bank collaborator interface.
pub trait Bank {
    fn get_coins(&self, addr: &Address) -> Result<Coins, BankError>;

    fn set_coins(&self, addr: &Address, coins: &Coins) -> Result<(), BankError>;

    fn has_coins(&self, addr: &Address, amt: &Coins) -> Result<bool, BankError> {
        Ok(self.get_coins(addr)?.is_all_gte(amt))
    }

    /// Move `amt` from `from` to `to`; either both balances change or neither does.
    fn send_coins(&self, from: &Address, to: &Address, amt: &Coins) -> Result<(), BankError> {
        if amt.is_zero() {
            return Ok(());
        }
        let from_coins = self.get_coins(from)?;
        let new_from = from_coins.safe_sub(amt).map_err(|e| match e {
            CoinsError::Negative { denom, have, need } => BankError::InsufficientCoins {
                address: *from,
                denom,
                have,
                want: need,
            },
            other => BankError::InvalidCoins(other),
        })?;
        // read `to` after the debit is computed so from == to stays a no-op
        let new_to = if from == to {
            from_coins
        } else {
            self.get_coins(to)?.add(amt).map_err(BankError::InvalidCoins)?
        };
        if from != to {
            self.set_coins(from, &new_from)?;
        }
        self.set_coins(to, &new_to)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct KvBank {
    kv: Arc<dyn KvStore>,
}

impl KvBank {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(addr: &Address) -> Vec<u8> {
        format!("{}{}", BALANCE_PREFIX, addr).into_bytes()
    }
}

impl Bank for KvBank {
    fn get_coins(&self, addr: &Address) -> Result<Coins, BankError> {
        match self.kv.get(&Self::key(addr))? {
            Some(raw) => bincode::deserialize(&raw)
                .map_err(|e| BankError::Store(anyhow::anyhow!("decode balance of {}: {}", addr, e))),
            None => Ok(Coins::empty()),
        }
    }

    fn set_coins(&self, addr: &Address, coins: &Coins) -> Result<(), BankError> {
        let key = Self::key(addr);
        if coins.is_zero() {
            self.kv.delete(&key)?;
            return Ok(());
        }
        let raw = bincode::serialize(coins).map_err(|e| anyhow::anyhow!("encode balance of {}: {}", addr, e))?;
        self.kv.set(&key, &raw)?;
        Ok(())
    }
}
