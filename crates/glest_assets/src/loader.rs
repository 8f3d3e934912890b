//! Cache-backed loaders.
//!
//! Asking for the same record twice returns the same `Arc` the second time.
//! Failed loads are never cached. If the cache refuses an entry the record
//! is still returned, just not shared.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use glest_core::data::{FactionDefinition, ResourceDefinition, TechTree, UnitDefinition};

use crate::cache::{AssetCache, AssetKind};
use crate::definitions::{self, PackLayout, TechPack};
use crate::error::Result;
use crate::g3d::{self, Model};

/// Loads records through a shared [`AssetCache`].
#[derive(Debug, Clone)]
pub struct CachedLoader {
    cache: Arc<AssetCache>,
}

impl CachedLoader {
    /// Wrap a shared cache.
    #[must_use]
    pub fn new(cache: Arc<AssetCache>) -> Self {
        Self { cache }
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    fn load<T, F>(&self, key: &Path, kind: AssetKind, load: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<(T, usize)>,
    {
        let key = key.display().to_string();
        if let Some(cached) = self.cache.get_as::<T>(&key) {
            return Ok(cached);
        }

        let (value, size) = load()?;
        let value = Arc::new(value);
        if let Err(error) = self.cache.put(key.as_str(), value.clone(), kind, size) {
            tracing::warn!(path = %key, %error, "Asset not cached");
        }
        Ok(value)
    }

    /// Load the tech tree of a pack.
    ///
    /// # Errors
    ///
    /// Any read or parse failure.
    pub fn tech_tree(&self, pack_dir: &Path) -> Result<Arc<TechTree>> {
        let file = PackLayout::new(pack_dir).tech_tree_file();
        self.load(&file, AssetKind::Definitions, || {
            Ok((definitions::load_tech_tree(pack_dir)?, file_size(&file)))
        })
    }

    /// Load one resource definition.
    ///
    /// # Errors
    ///
    /// Any read or parse failure.
    pub fn resource(&self, path: &Path) -> Result<Arc<ResourceDefinition>> {
        self.load(path, AssetKind::Definitions, || {
            Ok((definitions::load_resource(path)?, file_size(path)))
        })
    }

    /// Load one faction header.
    ///
    /// # Errors
    ///
    /// Any read or parse failure.
    pub fn faction(&self, faction_dir: &Path) -> Result<Arc<FactionDefinition>> {
        let file = definitions::faction_file(faction_dir);
        self.load(&file, AssetKind::Definitions, || {
            Ok((definitions::load_faction(faction_dir)?, file_size(&file)))
        })
    }

    /// Load one unit definition of a faction.
    ///
    /// # Errors
    ///
    /// Any read or parse failure.
    pub fn unit(&self, faction_dir: &Path, unit: &str) -> Result<Arc<UnitDefinition>> {
        let file = definitions::unit_file(&definitions::units_dir(faction_dir).join(unit));
        self.load(&file, AssetKind::Definitions, || {
            Ok((definitions::load_unit(faction_dir, unit)?, file_size(&file)))
        })
    }

    /// Load a whole content pack, keyed by its directory.
    ///
    /// # Errors
    ///
    /// The first read or parse failure.
    pub fn tech_pack(&self, pack_dir: &Path) -> Result<Arc<TechPack>> {
        self.load(pack_dir, AssetKind::Definitions, || {
            let pack = definitions::load_tech_pack(pack_dir)?;
            let size = pack_size(&pack);
            Ok((pack, size))
        })
    }

    /// Load a G3D model.
    ///
    /// # Errors
    ///
    /// [`crate::error::AssetError::Missing`] or
    /// [`crate::error::AssetError::Corrupt`].
    pub fn model(&self, path: &Path) -> Result<Arc<Model>> {
        self.load(path, AssetKind::Model, || {
            let model = g3d::load_g3d(path)?;
            let size = model.byte_size();
            Ok((model, size))
        })
    }
}

fn file_size(path: &Path) -> usize {
    std::fs::metadata(path).map_or(0, |m| m.len() as usize)
}

fn pack_size(pack: &TechPack) -> usize {
    let layout = &pack.layout;
    let mut size = file_size(&layout.tech_tree_file());
    if let Ok(files) = layout.resource_files() {
        size += files.iter().map(|f| file_size(f)).sum::<usize>();
    }
    for faction in &pack.factions {
        size += file_size(&definitions::faction_file(&faction.dir));
        size += faction
            .units
            .iter()
            .map(|u| file_size(&definitions::unit_file(&faction.unit_dir(&u.name))))
            .sum::<usize>();
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    #[test]
    fn test_failures_are_not_cached() {
        let loader = CachedLoader::new(Arc::new(AssetCache::new(CacheConfig::unbounded())));
        let path = Path::new("definitely/not/here.g3d");
        assert!(loader.model(path).is_err());
        assert!(loader.model(path).is_err());

        let stats = loader.cache().stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.misses, 2);
    }
}
