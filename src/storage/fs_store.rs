use crate::storage::traits::{BatchOp, KvIter, KvStore, WriteBatch};
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// One file per key under `dir`. The file is named by the hex SHA-256 of
/// the key, so names stay short for any key length, and holds
/// bincode(key, value) so scans can recover the key.
pub struct FsKvStore {
    dir: PathBuf,
    // serializes writers so a batch is applied as a unit
    write_lock: Mutex<()>,
}

const NAME_LEN: usize = 64;

impl FsKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    fn key_path(&self, key: &[u8]) -> PathBuf {
        self.dir.join(hex::encode(Sha256::digest(key)))
    }

    fn read_entry(p: &Path) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut f = OpenOptions::new().read(true).open(p)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        bincode::deserialize(&buf).map_err(|e| anyhow!("corrupt entry {}: {}", p.display(), e))
    }

    fn put_file(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let p = self.key_path(key);
        let tmp = p.with_extension("tmp");
        let raw = bincode::serialize(&(key, value))?;
        let mut f = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp)?;
        f.write_all(&raw)?;
        f.sync_all()?;
        fs::rename(&tmp, &p)?;
        Ok(())
    }

    fn remove_file(&self, key: &[u8]) -> Result<()> {
        let p = self.key_path(key);
        if p.exists() {
            fs::remove_file(&p)?;
        }
        Ok(())
    }
}

impl KvStore for FsKvStore {
    fn name(&self) -> String {
        "fs".into()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let p = self.key_path(key);
        if !p.exists() {
            return Ok(None);
        }
        let (stored, value) = Self::read_entry(&p)?;
        if stored != key {
            return Err(anyhow!("entry {} holds a different key", p.display()));
        }
        Ok(Some(value))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.put_file(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.remove_file(key)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let _guard = self.write_lock.lock();
        for op in batch.ops() {
            match op {
                BatchOp::Put(k, v) => self.put_file(k, v)?,
                BatchOp::Delete(k) => self.remove_file(k)?,
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvIter> {
        let mut items = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().into_string().unwrap_or_default();
            // skips temp files and anything not written by us
            if name.len() != NAME_LEN || hex::decode(&name).is_err() {
                continue;
            }
            let (key, value) = Self::read_entry(&entry.path())?;
            if key.starts_with(prefix) {
                items.push((key, value));
            }
        }
        // directory order is not deterministic
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(KvIter { items })
    }

    fn path(&self) -> Option<PathBuf> {
        Some(self.dir.clone())
    }
}
