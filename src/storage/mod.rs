//! Storage module: abstraction over the ledger key-value backend.
//!
//! Engines: in-memory, simple FS store, RocksDB (feature "rocksdb-db").
//! `CacheKvStore` stages writes over any engine for one message.
//! Use `storage::open(path, engine)` to create an Arc<dyn KvStore> to pass to the keeper.

pub mod cache_store;
pub mod fs_store;
pub mod mem_store;
pub mod traits;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use cache_store::CacheKvStore;
pub use fs_store::FsKvStore;
pub use mem_store::MemKvStore;
pub use traits::{BatchOp, KvIter, KvStore, WriteBatch};

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::RocksKvStore;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Engine selection enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    Memory,
    #[default]
    Fs,
    #[value(name = "rocksdb")]
    RocksDb,
}

/// Open a KvStore from path using the preferred engine.
pub fn open(path: impl AsRef<Path>, engine: StorageEngine) -> Result<Arc<dyn KvStore>> {
    match engine {
        StorageEngine::Memory => Ok(Arc::new(MemKvStore::new())),
        StorageEngine::Fs => {
            let s = FsKvStore::open(path)?;
            Ok(Arc::new(s))
        }
        #[cfg(feature = "rocksdb")]
        StorageEngine::RocksDb => {
            let s = RocksKvStore::open(path)?;
            Ok(Arc::new(s))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageEngine::RocksDb => Err(anyhow::anyhow!(
            "rocksdb engine requested but the crate was built without the rocksdb-db feature"
        )),
    }
}
