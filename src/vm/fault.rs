//! Faults raised by the VM.
//!
//! A fault is data: its `kind` says whether the message was malformed
//! (`Fatal`) or contract logic failed (`Recoverable`). The keeper never
//! relies on unwinding to tell the two apart.

use crate::keeper::banker::BankerError;
use crate::state::BankError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Malformed call or program: arity mismatch, missing body, bad unit.
    Fatal,
    /// Contract-level failure: explicit abort, banker rejection, resource limits.
    Recoverable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmFault {
    pub kind: FaultKind,
    pub message: String,
}

impl VmFault {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self { kind: FaultKind::Fatal, message: message.into() }
    }

    pub fn recoverable(message: impl Into<String>) -> Self {
        Self { kind: FaultKind::Recoverable, message: message.into() }
    }

    /// Explicit abort from contract code.
    pub fn abort(message: impl fmt::Display) -> Self {
        Self::recoverable(format!("abort: {}", message))
    }

    pub fn arity(func: &str, want: usize, got: usize) -> Self {
        Self::fatal(format!("wrong number of arguments in call to {}: want {} got {}", func, want, got))
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == FaultKind::Fatal
    }
}

impl fmt::Display for VmFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for VmFault {}

impl From<BankerError> for VmFault {
    fn from(e: BankerError) -> Self {
        match e {
            BankerError::Bank(b) => b.into(),
            other => Self::recoverable(other.to_string()),
        }
    }
}

// a failing backend is a host fault, not a contract one
impl From<BankError> for VmFault {
    fn from(e: BankError) -> Self {
        match e {
            BankError::Store(_) => Self::fatal(e.to_string()),
            other => Self::recoverable(other.to_string()),
        }
    }
}
