//! G3D Model Reader
//!
//! Parser for the little-endian G3D morph-mesh model format.
//!
//! ## Layout
//!
//! ```text
//! G3D File Structure:
//! ├── "G3D" (3 bytes) + version (u8, 2..=4)
//! ├── mesh count (u16) + mesh type (u8, 0 = morph mesh)
//! └── per mesh
//!     ├── header (116 bytes): name[64], frames, vertices, indices,
//!     │   diffuse[3], specular[3], specular power, opacity,
//!     │   properties, texture bits
//!     ├── one 64-byte texture path per set texture bit
//!     ├── positions (frames × vertices × 3 f32)
//!     ├── normals (frames × vertices × 3 f32)
//!     ├── uvs (vertices × 2 f32, only when any texture bit is set)
//!     └── indices (indices × u32)
//! ```
//!
//! Positions and normals are frame-major: frame `f` starts at `f × vertices`.
//! Vertex data is renderer data and stays `f32`; nothing here feeds the
//! simulation.

use std::path::Path;

use thiserror::Error;

use crate::error::{AssetError, Result};

/// G3D magic bytes.
pub const G3D_MAGIC: [u8; 3] = *b"G3D";

/// Supported format versions.
pub const SUPPORTED_VERSIONS: [u8; 3] = [2, 3, 4];

/// Mesh type code of a morph mesh, the only supported type.
pub const MORPH_MESH: u8 = 0;

/// Width of fixed-size name and texture path fields.
const NAME_LEN: usize = 64;

/// Errors raised while parsing model bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum G3dError {
    /// Wrong magic bytes or unsupported version.
    #[error("Bad format: {0}")]
    BadFormat(String),

    /// The stream ended before a read completed.
    #[error("Truncated at byte {offset}: needed {needed} more bytes, {available} left")]
    Truncated {
        /// Byte offset of the failed read.
        offset: usize,
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left in the stream.
        available: usize,
    },

    /// Mesh type is not a morph mesh.
    #[error("Unsupported mesh type {0}")]
    UnsupportedMesh(u8),
}

/// Mesh property bits.
pub mod properties {
    /// Render both faces.
    pub const TWO_SIDED: u32 = 1 << 0;
    /// Tint with the owning player's color.
    pub const CUSTOM_COLOR: u32 = 1 << 1;
    /// Excluded from selection picking.
    pub const NO_SELECT: u32 = 1 << 2;
    /// Rendered with a glow pass.
    pub const GLOW: u32 = 1 << 3;
}

/// Surface material of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Diffuse color.
    pub diffuse: [f32; 3],
    /// Specular color.
    pub specular: [f32; 3],
    /// Specular exponent.
    pub specular_power: f32,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
}

/// One morph mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Mesh name.
    pub name: String,
    /// Animation frame count.
    pub frame_count: u32,
    /// Vertices per frame.
    pub vertex_count: u32,
    /// Index count.
    pub index_count: u32,
    /// Material.
    pub material: Material,
    /// Property bits (see [`properties`]).
    pub properties: u32,
    /// Texture slot bits.
    pub textures: u32,
    /// One path per set texture bit, in ascending bit order.
    pub texture_paths: Vec<String>,
    /// Frame-major vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Frame-major vertex normals.
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates, shared by all frames.
    pub uvs: Vec<[f32; 2]>,
    /// Triangle list indices into a single frame.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Check whether any texture slot is enabled.
    #[must_use]
    pub fn has_textures(&self) -> bool {
        self.textures != 0
    }

    /// Check a property bit.
    #[must_use]
    pub fn has_property(&self, bit: u32) -> bool {
        self.properties & bit != 0
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    /// Positions of one frame, or `None` past the last frame.
    #[must_use]
    pub fn frame_positions(&self, frame: u32) -> Option<&[[f32; 3]]> {
        if frame >= self.frame_count {
            return None;
        }
        let per_frame = self.vertex_count as usize;
        let start = frame as usize * per_frame;
        self.positions.get(start..start + per_frame)
    }

    /// Structural problems the parser tolerates but consumers should not.
    ///
    /// Reports an index count that is not a multiple of three and the
    /// first index that does not address a vertex of a frame.
    #[must_use]
    pub fn index_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.index_count % 3 != 0 {
            problems.push(format!(
                "mesh '{}' has {} indices, not a multiple of 3",
                self.name, self.index_count
            ));
        }
        if let Some((at, index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, &index)| index >= self.vertex_count)
        {
            problems.push(format!(
                "mesh '{}' index {at} is {index}, but the mesh has {} vertices",
                self.name, self.vertex_count
            ));
        }
        problems
    }

    /// Approximate heap footprint in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.positions.len() * 12
            + self.normals.len() * 12
            + self.uvs.len() * 8
            + self.indices.len() * 4
            + self.texture_paths.iter().map(String::len).sum::<usize>()
            + self.name.len()
    }
}

/// A parsed G3D model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Format version the file declared.
    pub version: u8,
    /// Meshes in file order.
    pub meshes: Vec<Mesh>,
}

impl Model {
    /// Number of meshes.
    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Sum of per-frame vertex counts.
    #[must_use]
    pub fn total_vertices(&self) -> u64 {
        self.meshes.iter().map(|m| u64::from(m.vertex_count)).sum()
    }

    /// Sum of triangle counts.
    #[must_use]
    pub fn total_triangles(&self) -> u64 {
        self.meshes.iter().map(|m| u64::from(m.triangle_count())).sum()
    }

    /// Check whether any mesh is textured.
    #[must_use]
    pub fn has_textures(&self) -> bool {
        self.meshes.iter().any(Mesh::has_textures)
    }

    /// Check whether any mesh has more than one frame.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.meshes.iter().any(|m| m.frame_count > 1)
    }

    /// Every texture path referenced by any mesh, in file order.
    pub fn texture_paths(&self) -> impl Iterator<Item = &str> {
        self.meshes
            .iter()
            .flat_map(|m| m.texture_paths.iter().map(String::as_str))
    }

    /// Approximate heap footprint in bytes, used as the cache size.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.meshes.iter().map(Mesh::byte_size).sum()
    }
}

/// Sequential little-endian reader over a byte slice.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, needed: usize) -> std::result::Result<&'a [u8], G3dError> {
        if needed > self.remaining() {
            return Err(G3dError::Truncated {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    /// Fail early when `count` items of `width` bytes cannot be present.
    fn ensure(&self, count: usize, width: usize) -> std::result::Result<(), G3dError> {
        match count.checked_mul(width) {
            Some(needed) if needed <= self.remaining() => Ok(()),
            needed => Err(G3dError::Truncated {
                offset: self.offset,
                needed: needed.unwrap_or(usize::MAX),
                available: self.remaining(),
            }),
        }
    }

    fn u8(&mut self) -> std::result::Result<u8, G3dError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> std::result::Result<u16, G3dError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> std::result::Result<u32, G3dError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> std::result::Result<f32, G3dError> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn vec3(&mut self) -> std::result::Result<[f32; 3], G3dError> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    fn name(&mut self) -> std::result::Result<String, G3dError> {
        let field = self.take(NAME_LEN)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        Ok(String::from_utf8_lossy(&field[..end]).into_owned())
    }
}

/// Parse a model from bytes.
///
/// # Errors
///
/// [`G3dError::BadFormat`] for a wrong magic or version,
/// [`G3dError::UnsupportedMesh`] for a non-morph mesh type and
/// [`G3dError::Truncated`] when any read runs past the end.
pub fn parse_g3d(bytes: &[u8]) -> std::result::Result<Model, G3dError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.take(3)?;
    if magic != G3D_MAGIC {
        return Err(G3dError::BadFormat(format!(
            "magic is {:?}, expected \"G3D\"",
            String::from_utf8_lossy(magic)
        )));
    }
    let version = reader.u8()?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(G3dError::BadFormat(format!("unsupported version {version}")));
    }

    let mesh_count = reader.u16()?;
    let mesh_type = reader.u8()?;
    if mesh_type != MORPH_MESH {
        return Err(G3dError::UnsupportedMesh(mesh_type));
    }

    let meshes = (0..mesh_count)
        .map(|_| read_mesh(&mut reader))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if reader.remaining() > 0 {
        tracing::debug!(trailing = reader.remaining(), "Ignoring trailing model bytes");
    }

    Ok(Model { version, meshes })
}

fn read_mesh(reader: &mut Reader<'_>) -> std::result::Result<Mesh, G3dError> {
    let name = reader.name()?;
    let frame_count = reader.u32()?;
    let vertex_count = reader.u32()?;
    let index_count = reader.u32()?;
    if frame_count == 0 {
        return Err(G3dError::BadFormat(format!("mesh '{name}' has no frames")));
    }
    if vertex_count == 0 {
        return Err(G3dError::BadFormat(format!("mesh '{name}' has no vertices")));
    }

    let material = Material {
        diffuse: reader.vec3()?,
        specular: reader.vec3()?,
        specular_power: reader.f32()?,
        opacity: reader.f32()?,
    };
    let properties = reader.u32()?;
    let textures = reader.u32()?;

    let texture_paths = (0..textures.count_ones())
        .map(|_| reader.name())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let frame_vertices = (frame_count as usize).saturating_mul(vertex_count as usize);
    reader.ensure(frame_vertices, 12)?;
    let positions = (0..frame_vertices)
        .map(|_| reader.vec3())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    reader.ensure(frame_vertices, 12)?;
    let normals = (0..frame_vertices)
        .map(|_| reader.vec3())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let uvs = if textures != 0 {
        reader.ensure(vertex_count as usize, 8)?;
        (0..vertex_count)
            .map(|_| Ok([reader.f32()?, reader.f32()?]))
            .collect::<std::result::Result<Vec<_>, G3dError>>()?
    } else {
        Vec::new()
    };

    reader.ensure(index_count as usize, 4)?;
    let indices = (0..index_count)
        .map(|_| reader.u32())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Mesh {
        name,
        frame_count,
        vertex_count,
        index_count,
        material,
        properties,
        textures,
        texture_paths,
        positions,
        normals,
        uvs,
        indices,
    })
}

/// Read and parse a model file.
///
/// # Errors
///
/// [`AssetError::Missing`] when the file does not exist and
/// [`AssetError::Corrupt`] when it does not parse.
pub fn load_g3d(path: &Path) -> Result<Model> {
    let bytes = std::fs::read(path).map_err(|e| AssetError::from_io(path, e))?;
    let model = parse_g3d(&bytes).map_err(|source| AssetError::Corrupt {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        meshes = model.mesh_count(),
        triangles = model.total_triangles(),
        "Loaded model"
    );
    Ok(model)
}
