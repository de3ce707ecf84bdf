use crate::identity;
use anyhow::{Context, Result};
use facematch_vision::{Embedding, PixelScale};
use fs2::FileExt;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

const STORE_FILE: &str = "identities.bin";
const LOCK_FILE: &str = "identities.lock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: u64,
    /// Derived from `name` by [`identity::stable_key`].
    pub key: String,
    pub name: String,
    pub embedding: Vec<f32>,
    /// Pixel scaling the embedding was computed under. Probes must match it.
    pub pixel_scale: PixelScale,
}

/// What the matching core needs from persistence.
pub trait EmbeddingStore {
    /// Create or replace the record for `name`'s stable key. Saving the same
    /// person again overwrites the embedding and keeps the id.
    fn save(&self, name: &str, embedding: &Embedding, scale: PixelScale)
        -> Result<IdentityRecord>;

    /// `Ok(None)` means there is no such identity.
    fn fetch_by_id(&self, id: u64) -> Result<Option<IdentityRecord>>;

    fn remove(&self, id: u64) -> Result<bool>;

    fn list(&self) -> Result<Vec<IdentityRecord>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Records {
    next_id: u64,
    records: Vec<IdentityRecord>,
}

impl Records {
    fn upsert(
        &mut self,
        name: &str,
        embedding: &Embedding,
        scale: PixelScale,
    ) -> Result<IdentityRecord> {
        let key = identity::stable_key(name)?;
        let embedding = embedding.as_slice().to_vec();

        if let Some(existing) = self.records.iter_mut().find(|r| r.key == key) {
            existing.name = name.to_string();
            existing.embedding = embedding;
            existing.pixel_scale = scale;
            return Ok(existing.clone());
        }

        self.next_id += 1;
        let record = IdentityRecord {
            id: self.next_id,
            key,
            name: name.to_string(),
            embedding,
            pixel_scale: scale,
        };
        self.records.push(record.clone());
        Ok(record)
    }

    fn get(&self, id: u64) -> Option<IdentityRecord> {
        self.records.iter().find(|r| r.id == id).cloned()
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }
}

/// All identities in one postcard file under a directory.
///
/// Every access holds an exclusive lock on a sibling lock file, so handles in
/// other processes see each read-modify-write as one step.
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    fn read(&self) -> Result<Records> {
        let file = self.path();
        if !file.exists() {
            return Ok(Records::default());
        }
        let data = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
        postcard::from_bytes(&data).with_context(|| format!("decoding {}", file.display()))
    }

    fn write(&self, records: &Records) -> Result<()> {
        let file = self.path();
        let tmp = file.with_extension("bin.tmp");
        let data = postcard::to_allocvec(records)?;
        std::fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &file).with_context(|| format!("replacing {}", file.display()))?;
        Ok(())
    }

    fn lock_file(&self) -> Result<File> {
        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening lock file {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("locking {}", path.display()))?;
        Ok(file)
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut Records) -> Result<(T, bool)>) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let lock = self.lock_file()?;
        let result = self.apply(f);
        FileExt::unlock(&lock)
            .with_context(|| format!("unlocking store in {}", self.dir.display()))?;
        result
    }

    fn apply<T>(&self, f: impl FnOnce(&mut Records) -> Result<(T, bool)>) -> Result<T> {
        let mut records = self.read()?;
        let (out, dirty) = f(&mut records)?;
        if dirty {
            self.write(&records)?;
        }
        Ok(out)
    }
}

impl EmbeddingStore for FileStore {
    fn save(&self, name: &str, embedding: &Embedding, scale: PixelScale) -> Result<IdentityRecord> {
        let record = self.with_records(|r| Ok((r.upsert(name, embedding, scale)?, true)))?;
        info!("saved identity {} ({})", record.id, record.key);
        Ok(record)
    }

    fn fetch_by_id(&self, id: u64) -> Result<Option<IdentityRecord>> {
        self.with_records(|r| Ok((r.get(id), false)))
    }

    fn remove(&self, id: u64) -> Result<bool> {
        self.with_records(|r| {
            let removed = r.remove(id);
            Ok((removed, removed))
        })
    }

    fn list(&self) -> Result<Vec<IdentityRecord>> {
        self.with_records(|r| Ok((r.records.clone(), false)))
    }
}

/// In-process store, for tests and hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, Records>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))
    }
}

impl EmbeddingStore for MemoryStore {
    fn save(&self, name: &str, embedding: &Embedding, scale: PixelScale) -> Result<IdentityRecord> {
        self.records()?.upsert(name, embedding, scale)
    }

    fn fetch_by_id(&self, id: u64) -> Result<Option<IdentityRecord>> {
        Ok(self.records()?.get(id))
    }

    fn remove(&self, id: u64) -> Result<bool> {
        Ok(self.records()?.remove(id))
    }

    fn list(&self) -> Result<Vec<IdentityRecord>> {
        Ok(self.records()?.records.clone())
    }
}
