use anyhow::Result;
use std::path::PathBuf;

/// Result of a prefix scan. Items are always in ascending key order so
/// that every node iterates the same way.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KvIter {
    // each item: (key, value)
    pub items: Vec<(Vec<u8>, Vec<u8>)>,
}

impl KvIter {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// A set of puts/deletes applied atomically by `KvStore::write_batch`.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Core key-value store trait (synchronous, deterministic).
pub trait KvStore: Send + Sync + 'static {
    fn name(&self) -> String;

    /// Get a key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Set a key / value
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Check existence
    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply a write batch atomically
    fn write_batch(&self, batch: WriteBatch) -> Result<()>;

    /// All entries whose key starts with `prefix`, ascending.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvIter>;

    /// Path where the engine stores data (useful for debugging)
    fn path(&self) -> Option<PathBuf> {
        None
    }
}
