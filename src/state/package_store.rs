//! Write-once package persistence over a `KvStore`.
//!
//! Layout:
//! - `pkg/<path>@<version>`          -> bincode(PackageRecord)
//! - `file/<path>@<version>/<name>`  -> raw file body
//!
//! Metadata and bodies are split so `get_package(.., include_files = false)`
//! never reads file bodies. There is no update or delete path.

use crate::storage::{KvStore, WriteBatch};
use crate::types::{MemFile, MemMod, MemPackage, MemPackageInfo, PackageKey, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const PKG_PREFIX: &str = "pkg/";
const FILE_PREFIX: &str = "file/";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("package {0} already exists")]
    AlreadyExists(PackageKey),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("corrupt package record for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Persisted metadata of one package version.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PackageRecord {
    name: String,
    mod_file: MemMod,
    file_names: Vec<String>,
}

#[derive(Clone)]
pub struct PackageStore {
    kv: Arc<dyn KvStore>,
}

impl PackageStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn pkg_key(path: &str, version: &str) -> Vec<u8> {
        format!("{}{}@{}", PKG_PREFIX, path, version).into_bytes()
    }

    fn file_key(path: &str, version: &str, name: &str) -> Vec<u8> {
        format!("{}{}@{}/{}", FILE_PREFIX, path, version, name).into_bytes()
    }

    fn decode_record(key: &[u8], raw: &[u8]) -> Result<PackageRecord, StoreError> {
        bincode::deserialize(raw).map_err(|e| StoreError::Corrupt {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        })
    }

    pub fn has_package(&self, path: &str, version: &str) -> Result<bool, StoreError> {
        Ok(self.kv.has(&Self::pkg_key(path, version))?)
    }

    /// Look up one version. With `include_files = false` the returned
    /// package carries file names with empty bodies.
    pub fn get_package(
        &self,
        path: &str,
        version: &str,
        include_files: bool,
    ) -> Result<Option<MemPackage>, StoreError> {
        let key = Self::pkg_key(path, version);
        let raw = match self.kv.get(&key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let record = Self::decode_record(&key, &raw)?;
        let mut files = Vec::with_capacity(record.file_names.len());
        for name in record.file_names {
            let body = if include_files {
                let fkey = Self::file_key(path, version, &name);
                let bytes = self.kv.get(&fkey)?.ok_or_else(|| StoreError::Corrupt {
                    key: String::from_utf8_lossy(&fkey).into_owned(),
                    reason: "missing file body".into(),
                })?;
                String::from_utf8(bytes).map_err(|e| StoreError::Corrupt {
                    key: String::from_utf8_lossy(&fkey).into_owned(),
                    reason: e.to_string(),
                })?
            } else {
                String::new()
            };
            files.push(MemFile { name, body });
        }
        Ok(Some(MemPackage { name: record.name, mod_file: record.mod_file, files }))
    }

    /// Persist a package. Fails if `(path, version)` is already present;
    /// the first write always wins.
    pub fn add_package(&self, pkg: &MemPackage) -> Result<(), StoreError> {
        pkg.validate()?;
        let (path, version) = (pkg.path(), pkg.version());
        if self.has_package(path, version)? {
            return Err(StoreError::AlreadyExists(pkg.key()));
        }
        let record = PackageRecord {
            name: pkg.name.clone(),
            mod_file: pkg.mod_file.clone(),
            file_names: pkg.files.iter().map(|f| f.name.clone()).collect(),
        };
        let raw = bincode::serialize(&record).map_err(|e| anyhow::anyhow!("encode package record: {}", e))?;

        let mut batch = WriteBatch::new();
        for file in &pkg.files {
            batch.put(Self::file_key(path, version, &file.name), file.body.clone().into_bytes());
        }
        batch.put(Self::pkg_key(path, version), raw);
        self.kv.write_batch(batch)?;
        tracing::debug!(pkg_path = %path, version = %version, files = pkg.files.len(), "package stored");
        Ok(())
    }

    /// Stored versions of `path`, in key order.
    pub fn versions(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{}{}@", PKG_PREFIX, path);
        let scan = self.kv.scan_prefix(prefix.as_bytes())?;
        Ok(scan
            .items
            .into_iter()
            .map(|(k, _)| String::from_utf8_lossy(&k[prefix.len()..]).into_owned())
            .collect())
    }

    /// Every stored version of `path` with metadata only.
    pub fn package_info(&self, path: &str) -> Result<Option<MemPackageInfo>, StoreError> {
        let mut versions = Vec::new();
        for version in self.versions(path)? {
            if let Some(pkg) = self.get_package(path, &version, false)? {
                versions.push(pkg);
            }
        }
        let name = match versions.first() {
            Some(p) => p.name.clone(),
            None => return Ok(None),
        };
        Ok(Some(MemPackageInfo { name, path: path.to_string(), versions }))
    }

    /// Keys of all stored packages, ordered by path then version.
    pub fn list(&self) -> Result<Vec<PackageKey>, StoreError> {
        let scan = self.kv.scan_prefix(PKG_PREFIX.as_bytes())?;
        let mut out = Vec::with_capacity(scan.len());
        for (k, v) in scan.items {
            let record = Self::decode_record(&k, &v)?;
            out.push(record.mod_file.key());
        }
        Ok(out)
    }
}
