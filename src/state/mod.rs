//! State stores layered over a `KvStore`.
//!
//! - PackageStore: write-once `(path, version)` -> package bundle
//! - KvBank: account balances (the bank collaborator)
//! - RealmState: contract-declared key/value state per package

pub mod bank;
pub mod package_store;
pub mod realm_state;

pub use bank::{Bank, BankError, KvBank};
pub use package_store::{PackageStore, StoreError};
pub use realm_state::RealmState;
