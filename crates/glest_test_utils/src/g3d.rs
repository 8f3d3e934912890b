//! Byte-level builder for G3D model files.
//!
//! Produces little-endian model bytes with deterministic vertex data, so
//! that parser and validator tests do not need binary fixtures checked in.

use std::io;
use std::path::Path;

/// Width of fixed-size name and texture path fields.
const NAME_LEN: usize = 64;

/// One mesh to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSpec {
    /// Mesh name (truncated to 63 bytes).
    pub name: String,
    /// Animation frame count.
    pub frames: u32,
    /// Vertices per frame.
    pub vertices: u32,
    /// Index count.
    pub indices: u32,
    /// Property bits.
    pub properties: u32,
    /// Texture paths; slot `i` sets texture bit `i`.
    pub textures: Vec<String>,
}

/// Fluent builder for G3D model bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct G3dBuilder {
    magic: [u8; 3],
    version: u8,
    mesh_type: u8,
    meshes: Vec<MeshSpec>,
    truncate_by: usize,
}

impl Default for G3dBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl G3dBuilder {
    /// Start a version 4 morph-mesh model with no meshes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *b"G3D",
            version: 4,
            mesh_type: 0,
            meshes: Vec::new(),
            truncate_by: 0,
        }
    }

    /// Override the magic bytes.
    #[must_use]
    pub fn magic(mut self, magic: [u8; 3]) -> Self {
        self.magic = magic;
        self
    }

    /// Override the format version.
    #[must_use]
    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Override the mesh type code.
    #[must_use]
    pub fn mesh_type(mut self, mesh_type: u8) -> Self {
        self.mesh_type = mesh_type;
        self
    }

    /// Add an untextured mesh.
    #[must_use]
    pub fn mesh(mut self, name: &str, frames: u32, vertices: u32, indices: u32) -> Self {
        self.meshes.push(MeshSpec {
            name: name.to_string(),
            frames,
            vertices,
            indices,
            properties: 0,
            textures: Vec::new(),
        });
        self
    }

    /// Add a texture slot to the last mesh.
    #[must_use]
    pub fn texture(mut self, path: &str) -> Self {
        if let Some(mesh) = self.meshes.last_mut() {
            mesh.textures.push(path.to_string());
        }
        self
    }

    /// Set property bits on the last mesh.
    #[must_use]
    pub fn properties(mut self, bits: u32) -> Self {
        if let Some(mesh) = self.meshes.last_mut() {
            mesh.properties = bits;
        }
        self
    }

    /// Drop this many bytes from the end of the output.
    #[must_use]
    pub fn truncate(mut self, bytes: usize) -> Self {
        self.truncate_by = bytes;
        self
    }

    /// Emit the model bytes.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic);
        out.push(self.version);
        out.extend_from_slice(&(self.meshes.len() as u16).to_le_bytes());
        out.push(self.mesh_type);

        for mesh in &self.meshes {
            write_name(&mut out, &mesh.name);
            for value in [mesh.frames, mesh.vertices, mesh.indices] {
                out.extend_from_slice(&value.to_le_bytes());
            }
            // Diffuse, specular, specular power, opacity.
            for value in [0.8f32, 0.8, 0.8, 0.2, 0.2, 0.2, 16.0, 1.0] {
                out.extend_from_slice(&value.to_le_bytes());
            }
            out.extend_from_slice(&mesh.properties.to_le_bytes());
            let texture_bits = (0..mesh.textures.len()).fold(0u32, |bits, slot| bits | (1 << slot));
            out.extend_from_slice(&texture_bits.to_le_bytes());
            for texture in &mesh.textures {
                write_name(&mut out, texture);
            }

            let per_frame = mesh.vertices as usize;
            let total = per_frame * mesh.frames as usize;
            for i in 0..total {
                let frame = (i / per_frame.max(1)) as f32;
                let v = (i % per_frame.max(1)) as f32;
                for value in [v, frame, v * 0.5] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            for _ in 0..total {
                for value in [0.0f32, 1.0, 0.0] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            if !mesh.textures.is_empty() {
                for v in 0..mesh.vertices {
                    let u = v as f32 / mesh.vertices.max(1) as f32;
                    for value in [u, 1.0 - u] {
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                }
            }
            for i in 0..mesh.indices {
                let index = i % mesh.vertices.max(1);
                out.extend_from_slice(&index.to_le_bytes());
            }
        }

        out.truncate(out.len().saturating_sub(self.truncate_by));
        out
    }

    /// Write the model bytes to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Any IO error from creating directories or writing the file.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.build())
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN - 1);
    field[..len].copy_from_slice(&bytes[..len]);
    out.extend_from_slice(&field);
}

/// A standing model: two textured single-frame meshes.
///
/// The body mesh has 382 vertices and 1632 indices; the staff mesh has
/// 24 vertices and 36 indices.
#[must_use]
pub fn standing_model() -> G3dBuilder {
    G3dBuilder::new()
        .mesh("body", 1, 382, 1632)
        .texture("body.tga")
        .mesh("staff", 1, 24, 36)
        .texture("staff.tga")
        .properties(0b0001)
}

/// A walking model: one textured mesh with eight frames.
#[must_use]
pub fn walking_model() -> G3dBuilder {
    G3dBuilder::new()
        .mesh("body", 8, 120, 540)
        .texture("body.tga")
}
