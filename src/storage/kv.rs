use std::collections::HashMap as StdHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::KeyValueStore;

/// Process-local store. Contents vanish with the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<parking_lot::RwLock<StdHashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.map.read().len() }
    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.map.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.map.write().remove(key).is_some())
    }

    fn keys(&self) -> Vec<String> {
        let mut out: Vec<String> = self.map.read().keys().cloned().collect();
        out.sort();
        out
    }
}

#[derive(Serialize, Deserialize)]
struct SnapEntry { key: String, value: String }

#[derive(Serialize, Deserialize)]
struct Snapshot { version: u32, created_ms: i64, entries: Vec<SnapEntry> }

const SNAPSHOT_VERSION: u32 = 1;

/// Directory-backed store. The whole map is snapshotted to `snapshot.bin` on
/// every mutation. A mutation becomes visible only once its snapshot is on disk,
/// so a failed write leaves both memory and disk unchanged.
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    map: Arc<parking_lot::RwLock<StdHashMap<String, String>>>,
    /// Serializes snapshot writers so temp files never interleave.
    write_guard: Arc<parking_lot::Mutex<()>>,
}

impl FileStore {
    /// Open (or create) a store under `dir`. An unreadable snapshot is moved aside
    /// to `snapshot.bin.corrupt` and the store starts empty.
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let s = Self {
            dir,
            map: Arc::new(parking_lot::RwLock::new(StdHashMap::new())),
            write_guard: Arc::new(parking_lot::Mutex::new(())),
        };
        if let Err(e) = s.load_snapshot() {
            warn!(target: "sce::storage", "snapshot at '{}' unreadable: {}; starting empty", s.snapshot_path().display(), e);
            let aside = s.snapshot_path().with_extension("bin.corrupt");
            if let Err(e) = std::fs::rename(s.snapshot_path(), &aside) {
                warn!(target: "sce::storage", "could not move corrupt snapshot aside: {}", e);
            }
        }
        Ok(s)
    }

    pub fn dir(&self) -> &Path { &self.dir }

    fn snapshot_path(&self) -> PathBuf { self.dir.join("snapshot.bin") }

    fn load_snapshot(&self) -> anyhow::Result<()> {
        let path = self.snapshot_path();
        if !path.exists() { return Ok(()); }
        let bytes = std::fs::read(&path)?;
        let snap: Snapshot = bincode::deserialize(&bytes)?;
        if snap.version != SNAPSHOT_VERSION {
            anyhow::bail!("unsupported snapshot version {}", snap.version);
        }
        let mut w = self.map.write();
        w.clear();
        for e in snap.entries.into_iter() {
            w.insert(e.key, e.value);
        }
        debug!(target: "sce::storage", "loaded {} key(s) from '{}'", w.len(), path.display());
        Ok(())
    }

    /// Write `next` as the snapshot, then make it the live map.
    /// Callers hold `write_guard` from staging until commit.
    fn commit(&self, next: StdHashMap<String, String>) -> anyhow::Result<()> {
        self.save_snapshot(&next)?;
        *self.map.write() = next;
        Ok(())
    }

    fn save_snapshot(&self, map: &StdHashMap<String, String>) -> anyhow::Result<()> {
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
        let mut entries: Vec<SnapEntry> = map
            .iter()
            .map(|(k, v)| SnapEntry { key: k.clone(), value: v.clone() })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        let snap = Snapshot { version: SNAPSHOT_VERSION, created_ms: now_ms, entries };
        let bytes = bincode::serialize(&snap)?;
        let tmp = self.snapshot_path().with_extension("bin.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(tmp, self.snapshot_path())?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let _guard = self.write_guard.lock();
        let mut next = self.map.read().clone();
        next.insert(key.to_string(), value);
        self.commit(next)
    }

    fn remove(&self, key: &str) -> anyhow::Result<bool> {
        let _guard = self.write_guard.lock();
        let mut next = self.map.read().clone();
        if next.remove(key).is_none() {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    fn keys(&self) -> Vec<String> {
        let mut out: Vec<String> = self.map.read().keys().cloned().collect();
        out.sort();
        out
    }
}
