//! Banker: the capability contract code uses to move coins.
//!
//! - `OrigSend`: spends from the coins attached to the message. The
//!   remaining budget lives on the `ExecContext` and is shared by every
//!   nested realm call; it only goes down.
//! - `RealmSend`: spends the current realm's own balance, limited only by
//!   what the bank holds for that address.
//! - `ReadOnly`: balance queries only.
//!
//! The kind is chosen by contract code per call, not by the keeper.

use crate::keeper::context::ExecContext;
use crate::state::{Bank, BankError};
use crate::types::{Address, Coins, CoinsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankerKind {
    ReadOnly,
    OrigSend,
    RealmSend,
}

impl fmt::Display for BankerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BankerKind::ReadOnly => "readonly",
            BankerKind::OrigSend => "origsend",
            BankerKind::RealmSend => "realmsend",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BankerError {
    #[error("insufficient coins error: orig send budget has {have}{denom}, wants {want}{denom}")]
    BudgetExceeded { denom: String, have: u64, want: u64 },

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error("{kind} banker can only send from {expected}, not {from}")]
    WrongSender { kind: BankerKind, expected: Address, from: Address },

    #[error("banker is read-only")]
    ReadOnly,

    #[error("realmsend banker used outside of a realm")]
    NoRealm,
}

impl BankerError {
    pub fn is_insufficient_coins(&self) -> bool {
        matches!(
            self,
            BankerError::BudgetExceeded { .. } | BankerError::Bank(BankError::InsufficientCoins { .. })
        )
    }
}

pub struct Banker<'a> {
    kind: BankerKind,
    ctx: &'a mut ExecContext,
    bank: &'a dyn Bank,
}

impl<'a> Banker<'a> {
    pub fn new(kind: BankerKind, ctx: &'a mut ExecContext, bank: &'a dyn Bank) -> Self {
        Self { kind, ctx, bank }
    }

    pub fn kind(&self) -> BankerKind {
        self.kind
    }

    pub fn get_coins(&self, addr: &Address) -> Result<Coins, BankerError> {
        Ok(self.bank.get_coins(addr)?)
    }

    pub fn send_coins(&mut self, from: &Address, to: &Address, amt: &Coins) -> Result<(), BankerError> {
        match self.kind {
            BankerKind::ReadOnly => Err(BankerError::ReadOnly),
            BankerKind::OrigSend => self.send_orig(from, to, amt),
            BankerKind::RealmSend => self.send_realm(from, to, amt),
        }
    }

    fn send_orig(&mut self, from: &Address, to: &Address, amt: &Coins) -> Result<(), BankerError> {
        let expected = self.ctx.orig_pkg_addr();
        if *from != expected {
            return Err(BankerError::WrongSender { kind: self.kind, expected, from: *from });
        }
        // checked before the transfer; budget untouched if either step fails
        let remaining = self.ctx.orig_send_remaining().safe_sub(amt).map_err(|e| match e {
            CoinsError::Negative { denom, have, need } => BankerError::BudgetExceeded { denom, have, want: need },
            other => BankerError::Bank(BankError::InvalidCoins(other)),
        })?;
        self.bank.send_coins(from, to, amt)?;
        tracing::debug!(%from, %to, amount = %amt, remaining = %remaining, "origsend transfer");
        self.ctx.set_orig_send_remaining(remaining);
        Ok(())
    }

    fn send_realm(&mut self, from: &Address, to: &Address, amt: &Coins) -> Result<(), BankerError> {
        let realm = self.ctx.current_realm().ok_or(BankerError::NoRealm)?;
        if *from != realm.pkg_addr {
            return Err(BankerError::WrongSender { kind: self.kind, expected: realm.pkg_addr, from: *from });
        }
        self.bank.send_coins(from, to, amt)?;
        tracing::debug!(%from, %to, amount = %amt, "realmsend transfer");
        Ok(())
    }
}
