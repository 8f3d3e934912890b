//! Lenient pack loading for validation.
//!
//! Unlike [`glest_assets::definitions::load_tech_pack`], a failure in one
//! file does not stop the load: it is recorded as an issue and the
//! remaining files are still read, so every rule sees as much of the pack
//! as possible.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glest_assets::definitions::{
    self, faction_file, stem, unit_file, units_dir, PackLayout,
};
use glest_assets::error::AssetError;
use glest_core::data::{FactionDefinition, ResourceDefinition, TechTree, UnitDefinition};

use super::report::{category, Issue};

/// A definition together with the file it came from.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    /// Source file.
    pub file: PathBuf,
    /// The record.
    pub definition: T,
}

/// What could be loaded of one faction directory.
#[derive(Debug, Clone)]
pub struct LoadedFaction {
    /// Faction directory.
    pub dir: PathBuf,
    /// Header, if it loaded.
    pub header: Option<Loaded<FactionDefinition>>,
    /// Unit directories found on disk, sorted.
    pub unit_dirs: Vec<PathBuf>,
    /// Unit definitions that loaded.
    pub units: Vec<Loaded<UnitDefinition>>,
}

impl LoadedFaction {
    /// Faction name: the header's, or the directory name.
    #[must_use]
    pub fn name(&self) -> String {
        self.header
            .as_ref()
            .map_or_else(|| stem(&self.dir), |h| h.definition.name.clone())
    }

    /// Check whether a unit type name resolves within this faction.
    #[must_use]
    pub fn has_unit(&self, name: &str) -> bool {
        self.units.iter().any(|u| u.definition.name == name)
    }

    /// Unit type names that loaded.
    #[must_use]
    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.definition.name.as_str()).collect()
    }

    /// Directory a unit definition is expected in.
    #[must_use]
    pub fn unit_dir(&self, name: &str) -> PathBuf {
        units_dir(&self.dir).join(name)
    }
}

/// Everything that could be loaded of one pack.
#[derive(Debug, Clone)]
pub struct LoadedPack {
    /// Pack layout.
    pub layout: PackLayout,
    /// Tech tree, if it loaded.
    pub tech_tree: Option<Loaded<TechTree>>,
    /// Resource definitions that loaded.
    pub resources: Vec<Loaded<ResourceDefinition>>,
    /// Faction directories.
    pub factions: Vec<LoadedFaction>,
}

/// Turn a load failure into an issue.
#[must_use]
pub fn load_issue(error: &AssetError, file: &Path) -> Issue {
    match error {
        AssetError::Parse(parse) => {
            Issue::error(category::XML_PARSE, format!("Failed to parse: {}", parse.cause))
                .file(file)
                .line(parse.line)
        }
        AssetError::Missing(path) => {
            Issue::error(category::ASSET_MISSING, format!("Missing: {path}")).file(file)
        }
        AssetError::Corrupt { source, .. } => {
            Issue::error(category::ASSET_CORRUPT, source.to_string()).file(file)
        }
        other => Issue::error(category::XML_PARSE, other.to_string()).file(file),
    }
}

impl LoadedPack {
    /// Load what can be loaded, returning load failures as issues.
    #[must_use]
    pub fn load(pack_dir: &Path) -> (Self, Vec<Issue>) {
        let layout = PackLayout::new(pack_dir);
        let mut issues = Vec::new();

        let tech_tree_file = layout.tech_tree_file();
        let tech_tree = match definitions::load_tech_tree(pack_dir) {
            Ok(definition) => Some(Loaded {
                file: tech_tree_file,
                definition,
            }),
            Err(e) => {
                issues.push(load_issue(&e, &tech_tree_file));
                None
            }
        };

        let mut resources = Vec::new();
        match layout.resource_files() {
            Ok(files) => {
                for file in files {
                    match definitions::load_resource(&file) {
                        Ok(definition) => resources.push(Loaded { file, definition }),
                        Err(e) => issues.push(load_issue(&e, &file)),
                    }
                }
            }
            Err(e) => issues.push(load_issue(&e, &layout.resources_dir())),
        }

        let mut factions = Vec::new();
        match layout.faction_dirs() {
            Ok(dirs) => {
                for dir in dirs {
                    factions.push(load_faction(dir, &mut issues));
                }
            }
            Err(e) => issues.push(load_issue(&e, &layout.factions_dir())),
        }

        (
            Self {
                layout,
                tech_tree,
                resources,
                factions,
            },
            issues,
        )
    }

    /// The tech tree, if it loaded.
    #[must_use]
    pub fn tech_tree(&self) -> Option<&TechTree> {
        self.tech_tree.as_ref().map(|t| &t.definition)
    }

    /// Resource names that loaded.
    #[must_use]
    pub fn resource_names(&self) -> BTreeSet<&str> {
        self.resources
            .iter()
            .map(|r| r.definition.name.as_str())
            .collect()
    }
}

fn load_faction(dir: PathBuf, issues: &mut Vec<Issue>) -> LoadedFaction {
    let file = faction_file(&dir);
    let header = match definitions::load_faction(&dir) {
        Ok(definition) => Some(Loaded { file, definition }),
        Err(e) => {
            issues.push(load_issue(&e, &file));
            None
        }
    };

    // A missing units/ directory is reported by the asset rule.
    let unit_dirs = definitions::unit_dirs(&dir).unwrap_or_default();
    let mut units = Vec::new();
    for unit_dir in &unit_dirs {
        let file = unit_file(unit_dir);
        match definitions::load_unit(&dir, &stem(unit_dir)) {
            Ok(definition) => units.push(Loaded { file, definition }),
            Err(e) => issues.push(load_issue(&e, &file)),
        }
    }

    LoadedFaction {
        dir,
        header,
        unit_dirs,
        units,
    }
}
