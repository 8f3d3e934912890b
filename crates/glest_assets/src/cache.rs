//! Bounded, thread-safe asset cache keyed by path.
//!
//! Entries hold opaque shared data (`Arc<dyn Any + Send + Sync>`), so a
//! single cache can store tech trees, unit definitions and models side by
//! side. Once inserted, data is immutable and readers share it without
//! further locking.
//!
//! Every operation takes one mutex: `get` mutates the hit counters and
//! reference counts, so readers and writers are not distinguished.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Opaque cached value.
pub type CachedData = Arc<dyn Any + Send + Sync>;

/// What kind of asset an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetKind {
    /// Parsed definition records.
    Definitions,
    /// Parsed G3D models.
    Model,
    /// Texture images.
    Texture,
    /// Sound and music.
    Audio,
}

/// Cache bounds. Zero means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total size of all entries, in bytes.
    pub max_bytes: usize,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024,
            max_entries: 4096,
        }
    }
}

impl CacheConfig {
    /// A cache without bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_bytes: 0,
            max_entries: 0,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    data: CachedData,
    kind: AssetKind,
    size: usize,
    ref_count: u32,
    /// Insertion sequence number; lower is older.
    loaded_at: u64,
}

/// Entry count and size of one asset kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    /// Number of entries.
    pub entries: usize,
    /// Total size in bytes.
    pub bytes: usize,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries.
    pub entries: usize,
    /// Total size in bytes.
    pub bytes: usize,
    /// Successful lookups.
    pub hits: u64,
    /// Failed lookups.
    pub misses: u64,
    /// Entries removed to make room.
    pub evictions: u64,
    /// Per-kind breakdown.
    pub by_kind: BTreeMap<AssetKind, KindStats>,
}

impl CacheStats {
    /// Hits over all lookups, or zero before the first lookup.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    next_sequence: u64,
}

impl CacheInner {
    fn remove(&mut self, path: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(path)?;
        self.bytes -= entry.size;
        Some(entry)
    }

    /// Victims in eviction order: fewest references first, then oldest.
    fn eviction_order(&self) -> Vec<(String, usize)> {
        let mut candidates: Vec<_> = self
            .entries
            .iter()
            .map(|(path, e)| (e.ref_count, e.loaded_at, path.clone(), e.size))
            .collect();
        candidates.sort_unstable_by_key(|&(refs, loaded_at, _, _)| (refs, loaded_at));
        candidates
            .into_iter()
            .map(|(_, _, path, size)| (path, size))
            .collect()
    }

    fn evict(&mut self, path: &str) {
        if let Some(entry) = self.remove(path) {
            self.evictions += 1;
            tracing::debug!(path, size = entry.size, refs = entry.ref_count, "Evicted asset");
        }
    }
}

/// Thread-safe, size- and count-bounded asset store.
#[derive(Debug, Default)]
pub struct AssetCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl AssetCache {
    /// Create an empty cache with the given bounds.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// The configured bounds.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Look up an entry, counting a hit or a miss.
    ///
    /// A hit also takes a reference on the entry, which protects it from
    /// eviction relative to less used entries.
    pub fn get(&self, path: &str) -> Option<CachedData> {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(path) {
            Some(entry) => {
                entry.ref_count = entry.ref_count.saturating_add(1);
                let data = Arc::clone(&entry.data);
                inner.hits += 1;
                Some(data)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Look up an entry and downcast it.
    ///
    /// An entry of another type counts as a hit but yields `None`.
    pub fn get_as<T: Any + Send + Sync>(&self, path: &str) -> Option<Arc<T>> {
        self.get(path)?.downcast::<T>().ok()
    }

    /// Check for an entry without touching counters.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.inner.lock().entries.contains_key(path)
    }

    /// Insert an entry, evicting others as needed.
    ///
    /// An existing entry at `path` is replaced. When the memory bound would
    /// be exceeded, entries are evicted with the fewest references first
    /// (oldest first among equals) until the new entry fits. When the entry
    /// bound would be exceeded, the oldest entry is evicted.
    ///
    /// # Errors
    ///
    /// [`CacheError::CacheFull`] when no amount of eviction makes room. The
    /// cache is left unchanged in that case.
    pub fn put(
        &self,
        path: impl Into<String>,
        data: CachedData,
        kind: AssetKind,
        size: usize,
    ) -> Result<(), CacheError> {
        let path = path.into();
        let mut inner = self.inner.lock();
        let max_bytes = self.config.max_bytes;

        if max_bytes > 0 && size > max_bytes {
            return Err(CacheError::CacheFull {
                requested: size,
                limit: max_bytes,
            });
        }

        inner.remove(&path);

        if max_bytes > 0 && inner.bytes + size > max_bytes {
            let needed = inner.bytes + size - max_bytes;
            let mut freed = 0;
            for (victim, victim_size) in inner.eviction_order() {
                if freed >= needed {
                    break;
                }
                inner.evict(&victim);
                freed += victim_size;
            }
        }

        if self.config.max_entries > 0 && inner.entries.len() >= self.config.max_entries {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.loaded_at)
                .map(|(path, _)| path.clone());
            if let Some(oldest) = oldest {
                inner.evict(&oldest);
            }
        }

        let loaded_at = inner.next_sequence;
        inner.next_sequence += 1;
        inner.bytes += size;
        inner.entries.insert(
            path,
            CacheEntry {
                data,
                kind,
                size,
                ref_count: 1,
                loaded_at,
            },
        );
        Ok(())
    }

    /// Drop one reference taken by [`AssetCache::get`].
    pub fn release(&self, path: &str) {
        if let Some(entry) = self.inner.lock().entries.get_mut(path) {
            entry.ref_count = entry.ref_count.saturating_sub(1);
        }
    }

    /// Current reference count of an entry.
    #[must_use]
    pub fn ref_count(&self, path: &str) -> Option<u32> {
        self.inner.lock().entries.get(path).map(|e| e.ref_count)
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.inner.lock().remove(path).is_some()
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.bytes = 0;
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut by_kind: BTreeMap<AssetKind, KindStats> = BTreeMap::new();
        for entry in inner.entries.values() {
            let slot = by_kind.entry(entry.kind).or_default();
            slot.entries += 1;
            slot.bytes += entry.size;
        }
        CacheStats {
            entries: inner.entries.len(),
            bytes: inner.bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            by_kind,
        }
    }
}
