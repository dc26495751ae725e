//! Staged write-back cache over a parent store.
//! - Reads fall through to the parent unless the key was written or deleted here
//! - Writes stay in the cache until `write()` flushes them as one batch
//! - Dropping the cache (or `discard()`) throws every staged write away
//!
//! One cache wraps each message execution, which makes the message's
//! package adds, coin transfers and realm state writes all-or-nothing.

use crate::storage::traits::{BatchOp, KvIter, KvStore, WriteBatch};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct CacheKvStore {
    parent: Arc<dyn KvStore>,
    /// staged entries: `None` marks a delete
    dirty: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl CacheKvStore {
    pub fn new(parent: Arc<dyn KvStore>) -> Self {
        Self { parent, dirty: RwLock::new(BTreeMap::new()) }
    }

    /// Number of staged (uncommitted) entries.
    pub fn dirty_len(&self) -> usize {
        self.dirty.read().len()
    }

    /// Flush staged entries to the parent atomically and clear the cache.
    pub fn write(&self) -> Result<()> {
        let mut dirty = self.dirty.write();
        if dirty.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for (k, v) in dirty.iter() {
            match v {
                Some(v) => batch.put(k.clone(), v.clone()),
                None => batch.delete(k.clone()),
            }
        }
        self.parent.write_batch(batch)?;
        dirty.clear();
        Ok(())
    }

    /// Drop all staged entries without touching the parent.
    pub fn discard(&self) {
        self.dirty.write().clear();
    }
}

impl KvStore for CacheKvStore {
    fn name(&self) -> String {
        format!("cache({})", self.parent.name())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.dirty.read().get(key) {
            return Ok(staged.clone());
        }
        self.parent.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.dirty.write().insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.dirty.write().insert(key.to_vec(), None);
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut dirty = self.dirty.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(k, v) => {
                    dirty.insert(k, Some(v));
                }
                BatchOp::Delete(k) => {
                    dirty.insert(k, None);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvIter> {
        // merge parent view with staged entries, staged wins
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.parent.scan_prefix(prefix)?.items.into_iter().collect();
        let dirty = self.dirty.read();
        for (k, v) in dirty.range(prefix.to_vec()..).take_while(|(k, _)| k.starts_with(prefix)) {
            match v {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        Ok(KvIter { items: merged.into_iter().collect() })
    }

    fn path(&self) -> Option<std::path::PathBuf> {
        self.parent.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mem_store::MemKvStore;

    #[test]
    fn test_cache_get_set_write() {
        let base = Arc::new(MemKvStore::new());
        base.set(b"a", b"1").unwrap();
        let cache = CacheKvStore::new(base.clone());

        assert_eq!(cache.get(b"a").unwrap(), Some(b"1".to_vec()));
        cache.set(b"b", b"2").unwrap();
        cache.delete(b"a").unwrap();
        assert_eq!(cache.get(b"a").unwrap(), None);
        assert_eq!(cache.dirty_len(), 2);

        // parent untouched until write
        assert_eq!(base.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(base.get(b"b").unwrap().is_none());

        cache.write().unwrap();
        assert!(base.get(b"a").unwrap().is_none());
        assert_eq!(base.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(cache.dirty_len(), 0);
    }

    #[test]
    fn test_cache_discard() {
        let base = Arc::new(MemKvStore::new());
        let cache = CacheKvStore::new(base.clone());
        cache.set(b"x", b"1").unwrap();
        cache.discard();
        cache.write().unwrap();
        assert!(base.is_empty());
    }

    #[test]
    fn test_cache_scan_merges_staged() {
        let base = Arc::new(MemKvStore::new());
        base.set(b"k/1", b"a").unwrap();
        base.set(b"k/2", b"b").unwrap();
        let cache = CacheKvStore::new(base);
        cache.delete(b"k/1").unwrap();
        cache.set(b"k/0", b"z").unwrap();
        cache.set(b"k/2", b"c").unwrap();
        let scan = cache.scan_prefix(b"k/").unwrap();
        assert_eq!(scan.items, vec![(b"k/0".to_vec(), b"z".to_vec()), (b"k/2".to_vec(), b"c".to_vec())]);
    }

    #[test]
    fn test_nested_caches() {
        let base = Arc::new(MemKvStore::new());
        let block = Arc::new(CacheKvStore::new(base.clone()));
        let msg = CacheKvStore::new(block.clone());
        msg.set(b"k", b"v").unwrap();
        msg.write().unwrap();
        assert_eq!(block.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(base.get(b"k").unwrap().is_none());
    }
}
