//! Denominated coin sets.
//!
//! `Coins` is kept sorted by denomination with unique denoms and no zero
//! amounts, so two sets holding the same value always compare equal.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

lazy_static! {
    static ref RE_DENOM: Regex = Regex::new(r"^[a-z][a-z0-9]{2,15}$").expect("denom regex");
    static ref RE_COIN: Regex = Regex::new(r"^([0-9]+)([a-z][a-z0-9]{2,15})$").expect("coin regex");
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoinsError {
    #[error("invalid coin expression {0:?}")]
    InvalidCoin(String),

    #[error("invalid denomination {0:?}")]
    InvalidDenom(String),

    #[error("duplicate denomination {0:?}")]
    DuplicateDenom(String),

    #[error("amount overflow for {0:?}")]
    Overflow(String),

    #[error("negative result for {denom}: have {have}, subtracting {need}")]
    Negative { denom: String, have: u64, need: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Result<Self, CoinsError> {
        let denom = denom.into();
        if !RE_DENOM.is_match(&denom) {
            return Err(CoinsError::InvalidDenom(denom));
        }
        Ok(Self { denom, amount })
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = CoinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RE_COIN
            .captures(s.trim())
            .ok_or_else(|| CoinsError::InvalidCoin(s.to_string()))?;
        let amount = caps[1]
            .parse::<u64>()
            .map_err(|_| CoinsError::Overflow(s.to_string()))?;
        Ok(Self { denom: caps[2].to_string(), amount })
    }
}

/// Sorted by denom, no zero amounts. Serialized as its display string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a normalized set: sorted, zero amounts dropped, duplicates rejected.
    pub fn new(mut coins: Vec<Coin>) -> Result<Self, CoinsError> {
        coins.retain(|c| !c.is_zero());
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        for pair in coins.windows(2) {
            if pair[0].denom == pair[1].denom {
                return Err(CoinsError::DuplicateDenom(pair[0].denom.clone()));
            }
        }
        Ok(Self(coins))
    }

    /// Shorthand for a single-denomination set.
    pub fn single(denom: &str, amount: u64) -> Result<Self, CoinsError> {
        Self::new(vec![Coin::new(denom, amount)?])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zero amounts are never stored, so an empty set is the only zero value.
    pub fn is_zero(&self) -> bool {
        self.is_empty()
    }

    pub fn amount_of(&self, denom: &str) -> u64 {
        self.0
            .binary_search_by(|c| c.denom.as_str().cmp(denom))
            .map(|i| self.0[i].amount)
            .unwrap_or(0)
    }

    pub fn is_equal(&self, other: &Coins) -> bool {
        self == other
    }

    /// True when every denomination in `other` is covered by `self`.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }

    pub fn add(&self, other: &Coins) -> Result<Coins, CoinsError> {
        let mut out = self.0.clone();
        for coin in other.iter() {
            match out.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
                Ok(i) => {
                    out[i].amount = out[i]
                        .amount
                        .checked_add(coin.amount)
                        .ok_or_else(|| CoinsError::Overflow(coin.denom.clone()))?;
                }
                Err(i) => out.insert(i, coin.clone()),
            }
        }
        Ok(Self(out))
    }

    /// Subtract `other`, failing on the first denomination that would go negative.
    pub fn safe_sub(&self, other: &Coins) -> Result<Coins, CoinsError> {
        let mut out = self.0.clone();
        for coin in other.iter() {
            let have = self.amount_of(&coin.denom);
            if have < coin.amount {
                return Err(CoinsError::Negative {
                    denom: coin.denom.clone(),
                    have,
                    need: coin.amount,
                });
            }
            if let Ok(i) = out.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
                out[i].amount = have - coin.amount;
            }
        }
        out.retain(|c| !c.is_zero());
        Ok(Self(out))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for Coins {
    type Err = CoinsError;

    /// Accepts `"10ugnot,5uatom"` or `"10ugnot 5uatom"`; the empty string is no coins.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let coins = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(Coin::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen: Vec<&str> = Vec::with_capacity(coins.len());
        for c in &coins {
            if seen.contains(&c.denom.as_str()) {
                return Err(CoinsError::DuplicateDenom(c.denom.clone()));
            }
            seen.push(&c.denom);
        }
        Self::new(coins)
    }
}

impl From<Coins> for String {
    fn from(c: Coins) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for Coins {
    type Error = CoinsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
