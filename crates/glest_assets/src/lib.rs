//! # Glest Assets
//!
//! Everything that touches the disk on behalf of the simulation:
//! - [`g3d`] - Binary G3D model reader
//! - [`definitions`] - RON definition loader for content packs
//! - [`cache`] - Bounded, thread-safe asset cache
//! - [`loader`] - Cache-backed loaders that deduplicate records
//!
//! Records produced here are immutable once loaded. A loaded
//! [`definitions::TechPack`] converts into the [`glest_core::data::Ruleset`]
//! a world is built from.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod cache;
pub mod definitions;
pub mod error;
pub mod g3d;
pub mod loader;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{AssetCache, AssetKind, CacheConfig, CacheStats};
    pub use crate::definitions::{load_tech_pack, FactionPack, PackLayout, TechPack};
    pub use crate::error::{AssetError, CacheError, ParseError, Result};
    pub use crate::g3d::{load_g3d, parse_g3d, G3dError, Mesh, Model};
    pub use crate::loader::CachedLoader;
}
