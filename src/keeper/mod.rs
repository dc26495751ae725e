//! Keeper module: message handling around the VM.
//!
//! Exposes:
//! - VmKeeper: AddPackage / Call / Run and `deliver`
//! - ExecContext + RealmGuard: origin snapshot and realm stack
//! - Banker: ReadOnly / OrigSend / RealmSend coin views
//! - Msg*: transaction messages
//! - KeeperError / FatalFault / TxResult

pub mod banker;
pub mod context;
pub mod errors;
#[allow(clippy::module_inception)]
pub mod keeper;
pub mod msgs;

pub use banker::{Banker, BankerError, BankerKind};
pub use context::{BlockInfo, ExecContext, Origin, RealmFrame, RealmGuard};
pub use errors::{FatalFault, KeeperError, TxError, TxResult};
pub use keeper::VmKeeper;
pub use msgs::{run_pkg_path, Msg, MsgAddPackage, MsgCall, MsgRun};
