//! Execution keeper for realm packages.
//!
//! Stores versioned packages, builds the per-message execution context
//! (origin caller, origin package address, attached coins, realm stack),
//! exposes the origin-send and realm-send bankers to contract code, and
//! dispatches AddPackage / Call / Run messages against a pluggable VM.

pub mod cli;
pub mod config;
pub mod keeper;
pub mod state;
pub mod storage;
pub mod types;
pub mod utils;
pub mod vm;

#[cfg(test)]
mod tests;

pub use config::KeeperConfig;
pub use keeper::{FatalFault, KeeperError, Msg, TxResult, VmKeeper};
