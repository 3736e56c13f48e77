use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::state::{Isrc, TrackId};

const CACHE_FOLDER: &str = "heart-button";
const CACHE_FILE: &str = "isrc-cache.json";

/// The durable `track id -> ISRC` cache contract.
///
/// Entries are immutable once written (a track's ISRC never changes) and never
/// expire, so `put` is write-once and `get` never goes stale.
pub trait IsrcCache: Send + Sync {
    fn get(&self, track_id: &TrackId) -> Option<Isrc>;
    /// Records one mapping. Implementations may buffer the write; callers
    /// make it durable with [`IsrcCache::flush`].
    fn put(&self, track_id: &TrackId, isrc: &Isrc);
    /// Persists entries buffered by `put`. A no-op for purely in-memory
    /// implementations.
    fn flush(&self) {}
}

pub type SharedIsrcCache = Arc<dyn IsrcCache>;

/// A JSON-file-backed [`IsrcCache`] surviving process restarts.
///
/// `put` only updates the in-memory map; the file is rewritten once per
/// `flush`, so a reconciliation pass that resolves many tracks costs one
/// write instead of one per track.
pub struct FsIsrcCache {
    path: PathBuf,
    entries: RwLock<HashMap<TrackId, Isrc>>,
    dirty: AtomicBool,
}

impl FsIsrcCache {
    /// Loads the cache from `path`. A missing file is an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("read ISRC cache file {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("parse ISRC cache file {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    /// Opens the cache at the configured location, falling back to
    /// [`Self::default_path`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = match &config.cache_file {
            Some(path) => path.clone(),
            None => Self::default_path()?,
        };
        Self::load(path)
    }

    /// The default cache location under the user's cache directory.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs_next::cache_dir()
            .ok_or_else(|| anyhow!("cannot determine the user's cache directory"))?;
        Ok(dir.join(CACHE_FOLDER).join(CACHE_FILE))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn persist(path: &Path, entries: &HashMap<TrackId, Isrc>) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create cache folder {}", parent.display()))?;
        }
        let data = serde_json::to_string(entries).context("serialize ISRC cache")?;
        std::fs::write(path, data)
            .with_context(|| format!("write ISRC cache file {}", path.display()))?;
        Ok(())
    }
}

impl IsrcCache for FsIsrcCache {
    fn get(&self, track_id: &TrackId) -> Option<Isrc> {
        self.entries.read().get(track_id).cloned()
    }

    fn put(&self, track_id: &TrackId, isrc: &Isrc) {
        let mut entries = self.entries.write();
        if entries.contains_key(track_id) {
            return;
        }
        entries.insert(track_id.clone(), isrc.clone());
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn flush(&self) {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return;
        }
        let entries = self.entries.read();
        // a failed write only costs a re-fetch in a later session
        if let Err(err) = Self::persist(&self.path, &entries) {
            tracing::error!("Failed to persist the ISRC cache: {err:#}");
        }
    }
}

/// The in-memory ISRC memo shared by every button instance of one UI session,
/// avoiding repeated durable-cache reads and single-track lookups.
#[derive(Default)]
pub struct MemoCache {
    entries: Mutex<HashMap<TrackId, Isrc>>,
}

impl MemoCache {
    pub fn get(&self, track_id: &TrackId) -> Option<Isrc> {
        self.entries.lock().get(track_id).cloned()
    }

    pub fn put(&self, track_id: &TrackId, isrc: &Isrc) {
        self.entries
            .lock()
            .insert(track_id.clone(), isrc.clone());
    }
}
