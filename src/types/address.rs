//! Account and package addresses.
//!
//! An address is the first 20 bytes of the SHA-256 digest of a preimage.
//! Package addresses are derived from the import path so every node
//! computes the same address for the same realm.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address hex {0:?}")]
    InvalidHex(String),

    #[error("invalid address length: want {ADDRESS_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Address of an arbitrary preimage (e.g. a key name in tests).
    pub fn from_preimage(bz: &[u8]) -> Self {
        let digest = Sha256::digest(bz);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        Self(out)
    }

    /// Address owned by the package at `pkg_path`.
    pub fn derive_pkg_addr(pkg_path: &str) -> Self {
        Self::from_preimage(format!("pkgPath:{}", pkg_path).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
