//! Contract-declared state, namespaced per package path.
//!
//! Entries live under `realm/<pkg_path>@<key>` in the same store as the
//! message's other writes, so they commit or roll back with it. Package
//! paths never contain `@`, so the first `@` always ends the path and a
//! nested realm cannot address its parent's keys.

use crate::storage::KvStore;
use std::sync::Arc;

const REALM_PREFIX: &str = "realm/";

#[derive(Clone)]
pub struct RealmState {
    kv: Arc<dyn KvStore>,
}

impl RealmState {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(pkg_path: &str, key: &str) -> Vec<u8> {
        format!("{}{}@{}", REALM_PREFIX, pkg_path, key).into_bytes()
    }

    pub fn get(&self, pkg_path: &str, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.kv.get(&Self::key(pkg_path, key))
    }

    pub fn set(&self, pkg_path: &str, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.kv.set(&Self::key(pkg_path, key), value)
    }

    pub fn delete(&self, pkg_path: &str, key: &str) -> anyhow::Result<()> {
        self.kv.delete(&Self::key(pkg_path, key))
    }
}
