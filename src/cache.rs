//! A process-wide cache of loaded and derived datasets.
use crate::{config::CacheConfig, ColumnAliases, Dataset, Result, SourceConfig};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use qu::ick_use::*;
use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    time::{Duration, Instant},
};

/// The cache used by [`load_configured`](crate::load_configured).
pub static DATASET_CACHE: Lazy<DatasetCache> =
    Lazy::new(|| DatasetCache::from_config(&CacheConfig::default()));

/// What a cached dataset was loaded from. Two loads with equal keys give equal datasets, as long
/// as the files haven't changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    paths: Vec<PathBuf>,
    /// The source and alias settings, which change how the same files are read.
    settings: String,
}

impl SourceKey {
    pub fn new<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        source: &SourceConfig,
        aliases: &ColumnAliases,
    ) -> Self {
        SourceKey {
            paths: paths.into_iter().map(|p| normalize(p.as_ref())).collect(),
            settings: format!("{:?}", (source, aliases)),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// Drop `.` components and redundant separators, so spellings of the same relative path share a
/// key. Symlinks and `..` are left alone.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

struct Entry {
    dataset: Dataset,
    loaded_at: Instant,
    /// Insertion order, for evicting the oldest entry.
    seq: u64,
}

struct Entries {
    map: HashMap<SourceKey, Entry>,
    next_seq: u64,
    ttl: Duration,
    max_entries: usize,
}

impl Entries {
    fn fresh(&self, key: &SourceKey) -> Option<&Entry> {
        self.map
            .get(key)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
    }

    /// Drop expired entries, then the oldest ones until there is room for one more.
    fn make_room(&mut self) {
        let ttl = self.ttl;
        self.map.retain(|_, entry| entry.loaded_at.elapsed() < ttl);
        while self.map.len() >= self.max_entries {
            let oldest = match self.map.iter().min_by_key(|(_, entry)| entry.seq) {
                Some((key, _)) => key.clone(),
                None => break,
            };
            event!(Level::DEBUG, "evicting {:?} from the dataset cache", oldest.paths);
            self.map.remove(&oldest);
        }
    }
}

/// Loaded datasets, keyed by where they came from.
///
/// Entries expire after a time to live, and when the cache is full the entry that was inserted
/// first is evicted. Loads happen under the write lock, so a dataset is only loaded once however
/// many threads ask for it.
pub struct DatasetCache {
    entries: RwLock<Entries>,
}

impl DatasetCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        DatasetCache {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                next_seq: 0,
                ttl,
                max_entries,
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    /// Change the time to live and size limit. Applies to entries already cached.
    pub fn configure(&self, config: &CacheConfig) {
        let mut entries = self.entries.write();
        entries.ttl = config.ttl();
        entries.max_entries = config.max_entries;
    }

    /// The cached dataset for `key`, if there is one that hasn't expired.
    pub fn get(&self, key: &SourceKey) -> Option<Dataset> {
        self.entries
            .read()
            .fresh(key)
            .map(|entry| entry.dataset.clone())
    }

    /// The cached dataset for `key`, or the result of `load` which is then cached.
    ///
    /// Errors from `load` are returned and nothing is cached.
    pub fn get_or_load(
        &self,
        key: &SourceKey,
        load: impl FnOnce() -> Result<Dataset>,
    ) -> Result<Dataset> {
        if let Some(dataset) = self.get(key) {
            event!(Level::DEBUG, "dataset cache hit for {:?}", key.paths);
            return Ok(dataset);
        }
        let mut entries = self.entries.write();
        // someone else may have loaded it while we waited for the lock
        if let Some(entry) = entries.fresh(key) {
            return Ok(entry.dataset.clone());
        }
        event!(Level::DEBUG, "dataset cache miss for {:?}", key.paths);
        let dataset = load()?;
        if entries.max_entries == 0 {
            return Ok(dataset);
        }
        entries.map.remove(key);
        entries.make_room();
        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.map.insert(
            key.clone(),
            Entry {
                dataset: dataset.clone(),
                loaded_at: Instant::now(),
                seq,
            },
        );
        Ok(dataset)
    }

    /// Forget the dataset for `key`. Returns whether there was one.
    pub fn invalidate(&self, key: &SourceKey) -> bool {
        self.entries.write().map.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().map.clear();
    }

    /// Number of entries, including any that have expired but not yet been dropped.
    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
