//! # Glest Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Definition and ruleset fixtures
//! - A byte-level G3D model builder
//! - An on-disk content-pack writer
//! - Determinism test harness and property-testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod g3d;
pub mod pack;

/// Re-export proptest for convenience.
pub use proptest;
