//! Keeper error taxonomy.
//!
//! `KeeperError` is what a message handler returns. Every variant except
//! `Fatal` is a recoverable, transaction-level failure. `FatalFault` marks
//! a malformed call or a host failure and is never turned into a
//! transaction result.

use crate::state::{BankError, StoreError};
use crate::types::{PackageKey, ValidationError};
use crate::vm::{FaultKind, VmFault};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalFault {
    #[error("{0}")]
    Vm(VmFault),

    #[error("store failure: {0}")]
    Store(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid package path: {0} already exists")]
    InvalidPkgPath(PackageKey),

    #[error("package not found: {0}")]
    PackageNotFound(PackageKey),

    #[error(transparent)]
    Bank(BankError),

    #[error("vm call failed: {0}")]
    Vm(VmFault),

    #[error(transparent)]
    Fatal(#[from] FatalFault),
}

impl KeeperError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, KeeperError::Fatal(_))
    }

    /// Stable error code for transaction results.
    pub fn code(&self) -> &'static str {
        match self {
            KeeperError::Validation(_) => "invalid_package",
            KeeperError::InvalidPkgPath(_) => "invalid_pkg_path",
            KeeperError::PackageNotFound(_) => "package_not_found",
            KeeperError::Bank(BankError::InsufficientCoins { .. }) => "insufficient_coins",
            KeeperError::Bank(_) => "invalid_coins",
            KeeperError::Vm(_) => "vm_fault",
            KeeperError::Fatal(_) => "fatal",
        }
    }
}

impl From<VmFault> for KeeperError {
    fn from(f: VmFault) -> Self {
        match f.kind {
            FaultKind::Fatal => KeeperError::Fatal(FatalFault::Vm(f)),
            FaultKind::Recoverable => KeeperError::Vm(f),
        }
    }
}

impl From<StoreError> for KeeperError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(key) => KeeperError::InvalidPkgPath(key),
            StoreError::Validation(v) => KeeperError::Validation(v),
            StoreError::Backend(e) => KeeperError::Fatal(FatalFault::Store(e)),
            corrupt @ StoreError::Corrupt { .. } => {
                KeeperError::Fatal(FatalFault::Store(anyhow::anyhow!(corrupt.to_string())))
            }
        }
    }
}

impl From<BankError> for KeeperError {
    fn from(e: BankError) -> Self {
        match e {
            BankError::Store(e) => KeeperError::Fatal(FatalFault::Store(e)),
            other => KeeperError::Bank(other),
        }
    }
}

impl From<anyhow::Error> for KeeperError {
    fn from(e: anyhow::Error) -> Self {
        KeeperError::Fatal(FatalFault::Store(e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxError {
    pub code: String,
    pub log: String,
}

/// Outcome of one delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub data: String,
    pub error: Option<TxError>,
}

impl TxResult {
    pub fn ok(data: String) -> Self {
        Self { data, error: None }
    }

    pub fn err(e: &KeeperError) -> Self {
        Self { data: String::new(), error: Some(TxError { code: e.code().to_string(), log: e.to_string() }) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    #[test]
    fn test_fault_classification() {
        assert!(KeeperError::from(VmFault::arity("Echo", 1, 2)).is_fatal());
        assert!(!KeeperError::from(VmFault::abort("no")).is_fatal());
        let key = PackageKey { path: "gno.land/r/a".into(), version: "v0.0.0".into() };
        assert!(matches!(KeeperError::from(StoreError::AlreadyExists(key)), KeeperError::InvalidPkgPath(_)));
    }

    #[test]
    fn test_fatal_message_is_verbatim() {
        let e = KeeperError::from(VmFault::arity("Echo", 1, 2));
        assert_eq!(e.to_string(), "wrong number of arguments in call to Echo: want 1 got 2");
    }

    #[test]
    fn test_tx_result_carries_code_and_text() {
        let e = KeeperError::from(BankError::InsufficientCoins {
            address: Address::from_preimage(b"a"),
            denom: "ugnot".into(),
            have: 1,
            want: 2,
        });
        let res = TxResult::err(&e);
        assert!(!res.is_ok());
        let err = res.error.unwrap();
        assert_eq!(err.code, "insufficient_coins");
        assert!(err.log.contains("insufficient coins error"));
    }
}
