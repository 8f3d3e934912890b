//! Definition loading from RON content packs.
//!
//! A content pack is laid out as:
//!
//! ```text
//! <pack>/<pack>.ron                                 tech tree
//! <pack>/resources/<resource>.ron                   one per resource
//! <pack>/factions/<faction>/<faction>.ron           faction header
//! <pack>/factions/<faction>/units/<unit>/<unit>.ron unit or building
//! <pack>/factions/<faction>/units/<unit>/models/    G3D models
//! ```
//!
//! Every loader produces records from bytes only. Record names left empty
//! in a file default to the file (or directory) stem. Cross-reference
//! checks live in `glest_tools`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glest_core::data::{
    FactionDefinition, FactionRules, ResourceDefinition, Ruleset, TechTree, UnitDefinition,
};
use serde::de::DeserializeOwned;

use crate::error::{AssetError, ParseError, Result};

/// Extension of definition files.
pub const DEFINITION_EXTENSION: &str = "ron";

/// Last path component as a string, or an empty string.
#[must_use]
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Paths inside one content pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackLayout {
    root: PathBuf,
}

impl PackLayout {
    /// Lay out a pack rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Pack directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pack name: the directory name.
    #[must_use]
    pub fn name(&self) -> String {
        stem(&self.root)
    }

    /// The tech tree file.
    #[must_use]
    pub fn tech_tree_file(&self) -> PathBuf {
        self.root
            .join(format!("{}.{DEFINITION_EXTENSION}", self.name()))
    }

    /// Directory holding resource definitions.
    #[must_use]
    pub fn resources_dir(&self) -> PathBuf {
        self.root.join("resources")
    }

    /// Directory holding one subdirectory per faction.
    #[must_use]
    pub fn factions_dir(&self) -> PathBuf {
        self.root.join("factions")
    }

    /// Resource definition files, sorted by path.
    ///
    /// # Errors
    ///
    /// [`AssetError::Missing`] if the resources directory does not exist.
    pub fn resource_files(&self) -> Result<Vec<PathBuf>> {
        definition_files(&self.resources_dir())
    }

    /// Faction directories, sorted by path.
    ///
    /// # Errors
    ///
    /// [`AssetError::Missing`] if the factions directory does not exist.
    pub fn faction_dirs(&self) -> Result<Vec<PathBuf>> {
        subdirectories(&self.factions_dir())
    }
}

/// The header file of a faction directory.
#[must_use]
pub fn faction_file(faction_dir: &Path) -> PathBuf {
    faction_dir.join(format!("{}.{DEFINITION_EXTENSION}", stem(faction_dir)))
}

/// The `units/` directory of a faction.
#[must_use]
pub fn units_dir(faction_dir: &Path) -> PathBuf {
    faction_dir.join("units")
}

/// The definition file of a unit directory.
#[must_use]
pub fn unit_file(unit_dir: &Path) -> PathBuf {
    unit_dir.join(format!("{}.{DEFINITION_EXTENSION}", stem(unit_dir)))
}

/// Unit directories of a faction, sorted by path.
///
/// # Errors
///
/// [`AssetError::Missing`] if the faction has no `units/` directory.
pub fn unit_dirs(faction_dir: &Path) -> Result<Vec<PathBuf>> {
    subdirectories(&units_dir(faction_dir))
}

fn read_dir_sorted(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| AssetError::from_io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AssetError::from_io(dir, e))?.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    read_dir_sorted(dir, Path::is_dir)
}

fn definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    read_dir_sorted(dir, |path| {
        path.is_file() && path.extension().is_some_and(|ext| ext == DEFINITION_EXTENSION)
    })
}

/// Read and deserialize one RON definition file.
///
/// # Errors
///
/// [`AssetError::Missing`] when the file does not exist and
/// [`AssetError::Parse`] when its contents do not match the record shape.
pub fn read_definition<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| AssetError::from_io(path, e))?;
    let value = ron::from_str(&text).map_err(|e| ParseError::from_ron(path, &e))?;
    tracing::debug!(path = %path.display(), "Loaded definition");
    Ok(value)
}

fn default_name(name: &mut String, path: &Path) {
    if name.is_empty() {
        *name = stem(path);
    }
}

/// Load the tech tree of the pack rooted at `pack_dir`.
///
/// # Errors
///
/// Any read or parse failure of `<pack>/<pack>.ron`.
pub fn load_tech_tree(pack_dir: &Path) -> Result<TechTree> {
    let mut tree: TechTree = read_definition(&PackLayout::new(pack_dir).tech_tree_file())?;
    default_name(&mut tree.name, pack_dir);
    Ok(tree)
}

/// Load one resource definition file.
///
/// # Errors
///
/// Any read or parse failure.
pub fn load_resource(path: &Path) -> Result<ResourceDefinition> {
    let mut resource: ResourceDefinition = read_definition(path)?;
    default_name(&mut resource.name, path);
    Ok(resource)
}

/// Load every resource definition in a directory, sorted by file name.
///
/// # Errors
///
/// The first failure; nothing is returned partially.
pub fn load_resources(dir: &Path) -> Result<Vec<ResourceDefinition>> {
    definition_files(dir)?
        .iter()
        .map(|path| load_resource(path))
        .collect()
}

/// Load the header file of one faction directory.
///
/// # Errors
///
/// Any read or parse failure of `<faction>/<faction>.ron`.
pub fn load_faction(faction_dir: &Path) -> Result<FactionDefinition> {
    let mut faction: FactionDefinition = read_definition(&faction_file(faction_dir))?;
    default_name(&mut faction.name, faction_dir);
    Ok(faction)
}

/// Load the headers of every faction under a directory.
///
/// # Errors
///
/// The first failure.
pub fn load_factions(dir: &Path) -> Result<Vec<FactionDefinition>> {
    subdirectories(dir)?
        .iter()
        .map(|faction_dir| load_faction(faction_dir))
        .collect()
}

/// Load one unit (or building) definition of a faction.
///
/// # Errors
///
/// Any read or parse failure of `<faction>/units/<unit>/<unit>.ron`.
pub fn load_unit(faction_dir: &Path, unit: &str) -> Result<UnitDefinition> {
    load_unit_dir(&units_dir(faction_dir).join(unit))
}

fn load_unit_dir(unit_dir: &Path) -> Result<UnitDefinition> {
    let mut definition: UnitDefinition = read_definition(&unit_file(unit_dir))?;
    default_name(&mut definition.name, unit_dir);
    Ok(definition)
}

/// A faction header with every unit definition of the faction.
#[derive(Debug, Clone)]
pub struct FactionPack {
    /// Faction directory.
    pub dir: PathBuf,
    /// Faction header.
    pub definition: FactionDefinition,
    /// Unit and building definitions, sorted by directory name.
    pub units: Vec<UnitDefinition>,
}

impl FactionPack {
    /// Faction name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Find a unit definition by name.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&UnitDefinition> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Directory of a unit, whether or not it exists.
    #[must_use]
    pub fn unit_dir(&self, name: &str) -> PathBuf {
        units_dir(&self.dir).join(name)
    }

    fn to_rules(&self) -> FactionRules {
        FactionRules::new(
            Arc::new(self.definition.clone()),
            self.units.iter().cloned().map(Arc::new).collect(),
        )
    }
}

/// Load a faction header together with all of its units.
///
/// # Errors
///
/// The first read or parse failure.
pub fn load_faction_pack(faction_dir: &Path) -> Result<FactionPack> {
    let definition = load_faction(faction_dir)?;
    let units = unit_dirs(faction_dir)?
        .iter()
        .map(|dir| load_unit_dir(dir))
        .collect::<Result<Vec<_>>>()?;
    Ok(FactionPack {
        dir: faction_dir.to_path_buf(),
        definition,
        units,
    })
}

/// Every definition of one content pack.
#[derive(Debug, Clone)]
pub struct TechPack {
    /// Where the pack was loaded from.
    pub layout: PackLayout,
    /// The tech tree.
    pub tech_tree: TechTree,
    /// Resource definitions, sorted by file name.
    pub resources: Vec<ResourceDefinition>,
    /// Factions, sorted by directory name.
    pub factions: Vec<FactionPack>,
}

impl TechPack {
    /// Find a faction by name.
    #[must_use]
    pub fn faction(&self, name: &str) -> Option<&FactionPack> {
        self.factions.iter().find(|f| f.name() == name)
    }

    /// Build a shared ruleset from a copy of the definitions.
    #[must_use]
    pub fn to_ruleset(&self) -> Ruleset {
        Ruleset::new(
            Arc::new(self.tech_tree.clone()),
            self.resources.iter().cloned().map(Arc::new).collect(),
            self.factions.iter().map(FactionPack::to_rules).collect(),
        )
    }

    /// Consume the pack into a shared ruleset.
    #[must_use]
    pub fn into_ruleset(self) -> Ruleset {
        let factions = self.factions.iter().map(FactionPack::to_rules).collect();
        Ruleset::new(
            Arc::new(self.tech_tree),
            self.resources.into_iter().map(Arc::new).collect(),
            factions,
        )
    }
}

/// Load a whole content pack in one call.
///
/// # Errors
///
/// The first read or parse failure; a pack either loads completely or not at all.
pub fn load_tech_pack(pack_dir: &Path) -> Result<TechPack> {
    let layout = PackLayout::new(pack_dir);
    let tech_tree = load_tech_tree(pack_dir)?;
    let resources = load_resources(&layout.resources_dir())?;
    let factions = layout
        .faction_dirs()?
        .iter()
        .map(|dir| load_faction_pack(dir))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        pack = %layout.name(),
        resources = resources.len(),
        factions = factions.len(),
        units = factions.iter().map(|f| f.units.len()).sum::<usize>(),
        "Loaded tech pack"
    );

    Ok(TechPack {
        layout,
        tech_tree,
        resources,
        factions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = PackLayout::new("techs/megapack");
        assert_eq!(layout.name(), "megapack");
        assert_eq!(
            layout.tech_tree_file(),
            Path::new("techs/megapack/megapack.ron")
        );
        assert_eq!(
            faction_file(Path::new("techs/megapack/factions/magic")),
            Path::new("techs/megapack/factions/magic/magic.ron")
        );
        assert_eq!(
            unit_file(Path::new("factions/magic/units/golem")),
            Path::new("factions/magic/units/golem/golem.ron")
        );
    }

    #[test]
    fn test_default_name_keeps_explicit_names() {
        let mut name = String::new();
        default_name(&mut name, Path::new("resources/gold.ron"));
        assert_eq!(name, "gold");

        let mut name = "wood".to_string();
        default_name(&mut name, Path::new("resources/gold.ron"));
        assert_eq!(name, "wood");
    }
}
