#[cfg(feature = "rocksdb")]
use crate::storage::traits::{BatchOp, KvIter, KvStore, WriteBatch};
#[cfg(feature = "rocksdb")]
use anyhow::Result;
#[cfg(feature = "rocksdb")]
use rocksdb::{Direction, IteratorMode, Options, WriteBatch as RocksWriteBatch, DB};
#[cfg(feature = "rocksdb")]
use std::path::{Path, PathBuf};

#[cfg(feature = "rocksdb")]
pub struct RocksKvStore {
    db: DB,
    path: PathBuf,
}

#[cfg(feature = "rocksdb")]
impl RocksKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref())?;
        Ok(Self { db, path: path.as_ref().to_path_buf() })
    }
}

#[cfg(feature = "rocksdb")]
impl KvStore for RocksKvStore {
    fn name(&self) -> String {
        "rocksdb".into()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db.delete(key)?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut wb = RocksWriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(k, v) => wb.put(k, v),
                BatchOp::Delete(k) => wb.delete(k),
            }
        }
        self.db.write(wb)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvIter> {
        // keys are byte-ordered, so stop at the first key past the prefix
        let mut items = Vec::new();
        let iter = self.db.iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (k, v) = item?;
            if !k.starts_with(prefix) {
                break;
            }
            items.push((k.to_vec(), v.to_vec()));
        }
        Ok(KvIter { items })
    }

    fn path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}
