//! On-disk content-pack writer.
//!
//! Lays definitions out the way the asset loader expects them:
//!
//! ```text
//! <techs>/<pack>/<pack>.ron
//! <techs>/<pack>/resources/<resource>.ron
//! <techs>/<pack>/factions/<faction>/<faction>.ron
//! <techs>/<pack>/factions/<faction>/units/<unit>/<unit>.ron
//! <techs>/<pack>/factions/<faction>/units/<unit>/models/*.g3d
//! ```

use std::io;
use std::path::{Path, PathBuf};

use glest_core::data::{FactionDefinition, ResourceDefinition, TechTree, UnitDefinition};
use ron::ser::PrettyConfig;
use serde::Serialize;

use crate::fixtures::{classic_resources, classic_tech_tree, magic_faction, magic_units};
use crate::g3d::{standing_model, walking_model};

/// Name of the pack written by [`write_magic_pack`].
pub const MEGAPACK: &str = "megapack";

fn write_ron<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = ron::ser::to_string_pretty(value, PrettyConfig::new().struct_names(true))
        .map_err(io::Error::other)?;
    std::fs::write(path, text)
}

/// A faction with its unit definitions.
#[derive(Debug, Clone)]
pub struct FactionFiles {
    /// Faction header.
    pub faction: FactionDefinition,
    /// Unit and building definitions.
    pub units: Vec<UnitDefinition>,
}

/// Write a complete pack under `techs`, returning the pack directory.
///
/// Every model path referenced by a unit's skills is written: paths
/// containing `walking` get an animated model, all others a standing one.
/// Textures referenced by the models and unit icons are written as
/// placeholder files.
///
/// # Errors
///
/// Any IO or serialization error.
pub fn write_pack(
    techs: &Path,
    name: &str,
    tech_tree: &TechTree,
    resources: &[ResourceDefinition],
    factions: &[FactionFiles],
) -> io::Result<PathBuf> {
    let root = techs.join(name);
    write_ron(&root.join(format!("{name}.ron")), tech_tree)?;

    for resource in resources {
        write_ron(
            &root.join("resources").join(format!("{}.ron", resource.name)),
            resource,
        )?;
    }

    for files in factions {
        let faction_dir = root.join("factions").join(&files.faction.name);
        write_ron(
            &faction_dir.join(format!("{}.ron", files.faction.name)),
            &files.faction,
        )?;
        for unit in &files.units {
            let unit_dir = faction_dir.join("units").join(&unit.name);
            write_ron(&unit_dir.join(format!("{}.ron", unit.name)), unit)?;
            for model in unit.model_paths() {
                let path = unit_dir.join(model);
                let builder = if model.contains("walking") {
                    walking_model()
                } else {
                    standing_model()
                };
                builder.write_to(&path)?;
                if let Some(dir) = path.parent() {
                    for texture in ["body.tga", "staff.tga"] {
                        std::fs::write(dir.join(texture), b"TGA")?;
                    }
                }
            }
            if let Some(image) = &unit.image {
                let path = unit_dir.join(image);
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                std::fs::write(path, b"BM")?;
            }
        }
    }
    Ok(root)
}

/// Write the classic pack with the magic faction under `techs`.
///
/// # Errors
///
/// Any IO or serialization error.
pub fn write_magic_pack(techs: &Path) -> io::Result<PathBuf> {
    write_pack(
        techs,
        MEGAPACK,
        &classic_tech_tree(),
        &classic_resources(),
        &[FactionFiles {
            faction: magic_faction(),
            units: magic_units(),
        }],
    )
}

/// Path of a faction header inside a pack.
#[must_use]
pub fn faction_file(pack: &Path, faction: &str) -> PathBuf {
    pack.join("factions").join(faction).join(format!("{faction}.ron"))
}

/// Path of a unit directory inside a pack.
#[must_use]
pub fn unit_dir(pack: &Path, faction: &str, unit: &str) -> PathBuf {
    pack.join("factions").join(faction).join("units").join(unit)
}

/// Replace the first occurrence of `from` with `to` in a file.
///
/// # Errors
///
/// Any IO error, or `InvalidInput` if `from` does not occur.
pub fn replace_in_file(path: &Path, from: &str, to: &str) -> io::Result<()> {
    let text = std::fs::read_to_string(path)?;
    if !text.contains(from) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{from:?} not found in {}", path.display()),
        ));
    }
    std::fs::write(path, text.replacen(from, to, 1))
}
