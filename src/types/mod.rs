//! Value types shared by every layer of the keeper.
//!
//! - Address: 20-byte account/package identifiers
//! - Coins: denominated amounts with checked arithmetic
//! - MemPackage / MemMod / MemFile: package bundles and their validation

pub mod address;
pub mod coins;
pub mod mempackage;

pub use address::{Address, AddressError, ADDRESS_LEN};
pub use coins::{Coin, Coins, CoinsError};
pub use mempackage::{
    is_realm_path, package_clause, validate_pkg_path, FileKind, MemFile, MemMod, MemPackage,
    MemPackageInfo, PackageKey, Requirement, ValidationError, REALM_PATH_PREFIX,
};
