//! Model inspection.

use std::fmt;
use std::path::Path;

use glest_assets::error::Result;
use glest_assets::g3d::{load_g3d, properties, Mesh, Model};
use serde::Serialize;

/// Summary of one mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSummary {
    /// Mesh name.
    pub name: String,
    /// Frame count.
    pub frames: u32,
    /// Vertices per frame.
    pub vertices: u32,
    /// Triangle count.
    pub triangles: u32,
    /// Names of set property bits.
    pub properties: Vec<&'static str>,
    /// Texture paths.
    pub textures: Vec<String>,
    /// Index problems, if any.
    pub problems: Vec<String>,
}

impl MeshSummary {
    fn new(mesh: &Mesh) -> Self {
        let names = [
            (properties::TWO_SIDED, "two-sided"),
            (properties::CUSTOM_COLOR, "custom-color"),
            (properties::NO_SELECT, "no-select"),
            (properties::GLOW, "glow"),
        ];
        Self {
            name: mesh.name.clone(),
            frames: mesh.frame_count,
            vertices: mesh.vertex_count,
            triangles: mesh.triangle_count(),
            properties: names
                .iter()
                .filter(|(bit, _)| mesh.has_property(*bit))
                .map(|(_, name)| *name)
                .collect(),
            textures: mesh.texture_paths.clone(),
            problems: mesh.index_problems(),
        }
    }
}

/// Summary of a model file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Source file.
    pub path: String,
    /// Format version.
    pub version: u8,
    /// Total vertices per frame across meshes.
    pub total_vertices: u64,
    /// Total triangles across meshes.
    pub total_triangles: u64,
    /// Whether any mesh is textured.
    pub textured: bool,
    /// Whether any mesh has more than one frame.
    pub animated: bool,
    /// Per-mesh details.
    pub meshes: Vec<MeshSummary>,
}

impl ModelSummary {
    /// Summarize a parsed model.
    #[must_use]
    pub fn new(path: &Path, model: &Model) -> Self {
        Self {
            path: path.display().to_string(),
            version: model.version,
            total_vertices: model.total_vertices(),
            total_triangles: model.total_triangles(),
            textured: model.has_textures(),
            animated: model.is_animated(),
            meshes: model.meshes.iter().map(MeshSummary::new).collect(),
        }
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (G3D v{})", self.path, self.version)?;
        writeln!(
            f,
            "  {} meshes, {} vertices, {} triangles, textured: {}, animated: {}",
            self.meshes.len(),
            self.total_vertices,
            self.total_triangles,
            self.textured,
            self.animated
        )?;
        for mesh in &self.meshes {
            writeln!(
                f,
                "  - {}: {} frames x {} vertices, {} triangles",
                mesh.name, mesh.frames, mesh.vertices, mesh.triangles
            )?;
            if !mesh.properties.is_empty() {
                writeln!(f, "    properties: {}", mesh.properties.join(", "))?;
            }
            for texture in &mesh.textures {
                writeln!(f, "    texture: {texture}")?;
            }
            for problem in &mesh.problems {
                writeln!(f, "    problem: {problem}")?;
            }
        }
        Ok(())
    }
}

/// Load a model file and summarize it.
///
/// # Errors
///
/// Any load or parse failure.
pub fn inspect_model(path: &Path) -> Result<ModelSummary> {
    let model = load_g3d(path)?;
    Ok(ModelSummary::new(path, &model))
}
