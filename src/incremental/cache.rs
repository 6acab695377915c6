use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::CacheError;

const MANIFEST_FILE: &str = "manifest.bincode";

/// Snapshots kept per analysis kind before the oldest are evicted.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Dependencies,
    Metrics,
}

impl AnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::Dependencies => "deps_analysis",
            AnalysisKind::Metrics => "metrics_analysis",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one stored snapshot: an analysis kind at a revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub kind: String,
    pub revision: String,
}

impl CacheKey {
    pub fn new(kind: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            revision: revision.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.revision)
    }
}

/// Key/value store of opaque snapshot blobs.
pub trait CacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    fn set(&self, key: &CacheKey, snapshot: Vec<u8>) -> Result<(), CacheError>;

    /// Stored keys, least recently written first.
    fn list_keys(&self) -> Result<Vec<CacheKey>, CacheError>;

    fn make_key(&self, kind: AnalysisKind, revision: &str) -> CacheKey {
        CacheKey::new(kind.as_str(), revision)
    }
}

impl<T: CacheStore + ?Sized> CacheStore for &T {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &CacheKey, snapshot: Vec<u8>) -> Result<(), CacheError> {
        (**self).set(key, snapshot)
    }

    fn list_keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        (**self).list_keys()
    }

    fn make_key(&self, kind: AnalysisKind, revision: &str) -> CacheKey {
        (**self).make_key(kind, revision)
    }
}

/// Snapshot store with an in-memory layer and one bincode file per key.
///
/// The write order of keys is kept in a manifest next to the entries. At most
/// `max_entries` keys of one kind are kept; writing past that evicts the
/// oldest of the kind, file included.
pub struct SnapshotCache {
    memory_cache: DashMap<CacheKey, Vec<u8>>,
    manifest: Mutex<Vec<CacheKey>>,
    cache_dir: Option<PathBuf>,
    max_entries: usize,
}

impl SnapshotCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;

        let manifest_path = cache_dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.is_file() {
            match fs::read(&manifest_path)
                .map_err(CacheError::from)
                .and_then(|data| {
                    bincode::deserialize::<Vec<CacheKey>>(&data).map_err(CacheError::Decode)
                })
            {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(path = %manifest_path.display(), error = %err, "discarding unreadable cache manifest");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            memory_cache: DashMap::new(),
            manifest: Mutex::new(manifest),
            cache_dir: Some(cache_dir),
            max_entries: DEFAULT_MAX_SNAPSHOTS,
        })
    }

    /// Build an in-memory-only cache without touching the filesystem
    pub fn in_memory_only() -> Self {
        Self {
            memory_cache: DashMap::new(),
            manifest: Mutex::new(Vec::new()),
            cache_dir: None,
            max_entries: DEFAULT_MAX_SNAPSHOTS,
        }
    }

    /// Keep at most `max_entries` snapshots per analysis kind (at least one).
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Drop every entry, on disk and in memory.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.memory_cache.clear();
        self.manifest.lock().clear();
        if let Some(cache_dir) = &self.cache_dir {
            if cache_dir.exists() {
                fs::remove_dir_all(cache_dir)?;
                fs::create_dir_all(cache_dir)?;
            }
        }
        Ok(())
    }

    fn entry_path(&self, key: &CacheKey) -> Option<PathBuf> {
        let cache_dir = self.cache_dir.as_ref()?;

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let hash = hasher.finish();

        Some(cache_dir.join(format!("snapshot_{:x}.bincode", hash)))
    }

    /// Remove the oldest keys of `kind` beyond the cap from `manifest`,
    /// memory and disk.
    fn evict(&self, manifest: &mut Vec<CacheKey>, kind: &str) -> Result<(), CacheError> {
        let mut excess = manifest
            .iter()
            .filter(|key| key.kind == kind)
            .count()
            .saturating_sub(self.max_entries);
        if excess == 0 {
            return Ok(());
        }

        let mut evicted = Vec::with_capacity(excess);
        manifest.retain(|key| {
            if excess > 0 && key.kind == kind {
                excess -= 1;
                evicted.push(key.clone());
                false
            } else {
                true
            }
        });

        for key in evicted {
            self.memory_cache.remove(&key);
            if let Some(path) = self.entry_path(&key) {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
            debug!(key = %key, "evicted snapshot");
        }
        Ok(())
    }

    fn store_manifest(&self, keys: &[CacheKey]) -> Result<(), CacheError> {
        if let Some(cache_dir) = &self.cache_dir {
            let data = bincode::serialize(keys).map_err(CacheError::Encode)?;
            fs::write(cache_dir.join(MANIFEST_FILE), data)?;
        }
        Ok(())
    }
}

impl CacheStore for SnapshotCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.memory_cache.get(key) {
            debug!(key = %key, "snapshot cache hit (memory)");
            return Ok(Some(entry.clone()));
        }

        let Some(path) = self.entry_path(key) else {
            return Ok(None);
        };
        if !path.is_file() {
            debug!(key = %key, "snapshot cache miss");
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let (stored_key, snapshot): (CacheKey, Vec<u8>) =
            bincode::deserialize(&data).map_err(CacheError::Decode)?;
        if &stored_key != key {
            debug!(key = %key, "snapshot cache collision");
            return Ok(None);
        }

        debug!(key = %key, "snapshot cache hit (disk)");
        self.memory_cache.insert(key.clone(), snapshot.clone());
        Ok(Some(snapshot))
    }

    fn set(&self, key: &CacheKey, snapshot: Vec<u8>) -> Result<(), CacheError> {
        if let Some(path) = self.entry_path(key) {
            let data = bincode::serialize(&(key, &snapshot)).map_err(CacheError::Encode)?;
            fs::write(path, data)?;
        }
        self.memory_cache.insert(key.clone(), snapshot);

        let mut manifest = self.manifest.lock();
        manifest.retain(|existing| existing != key);
        manifest.push(key.clone());
        let evicted = self.evict(&mut manifest, &key.kind);
        self.store_manifest(&manifest)?;
        evicted
    }

    fn list_keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        Ok(self.manifest.lock().clone())
    }
}
