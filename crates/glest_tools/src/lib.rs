//! # Glest Development Tools
//!
//! Tooling that runs outside the simulation:
//! - Content-pack validation with structured reports
//! - Model inspection

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod inspect;
pub mod validate;
