//! Error types for asset loading.

use std::fmt;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::g3d::G3dError;

/// Result type alias using [`AssetError`].
pub type Result<T> = std::result::Result<T, AssetError>;

/// A definition file could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// File that failed to parse.
    pub file: String,
    /// 1-based line of the failure, when the parser reports one.
    pub line: Option<usize>,
    /// Parser message.
    pub cause: String,
}

impl ParseError {
    /// Build a parse error from a RON deserialization failure.
    #[must_use]
    pub fn from_ron(path: &Path, error: &ron::error::SpannedError) -> Self {
        let line = (error.position.line > 0).then_some(error.position.line);
        Self {
            file: path.display().to_string(),
            line,
            cause: error.code.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}: {}", self.file, self.cause),
            None => write!(f, "{}: {}", self.file, self.cause),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors raised by the asset cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Eviction cannot free enough memory for the new entry.
    #[error("Cache full: cannot fit {requested} bytes (limit {limit})")]
    CacheFull {
        /// Size of the rejected entry.
        requested: usize,
        /// Configured memory bound.
        limit: usize,
    },
}

/// Top-level error type for asset loading.
#[derive(Debug, Error)]
pub enum AssetError {
    /// A definition file failed to parse.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A referenced file or directory does not exist.
    #[error("Asset missing: {0}")]
    Missing(String),

    /// A model file exists but does not parse.
    #[error("Asset corrupt: {path}: {source}")]
    Corrupt {
        /// Offending file.
        path: String,
        /// Reader failure.
        #[source]
        source: G3dError,
    },

    /// Any other IO failure.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Offending file or directory.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The cache rejected an entry.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl AssetError {
    /// Map an IO failure on `path`, reporting absent files as [`AssetError::Missing`].
    #[must_use]
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::Missing(path.display().to_string())
        } else {
            Self::Io {
                path: path.display().to_string(),
                source,
            }
        }
    }

    /// Short, stable name of the error kind, for reports and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "ParseError",
            Self::Missing(_) => "AssetMissing",
            Self::Corrupt { .. } => "AssetCorrupt",
            Self::Io { .. } => "Io",
            Self::Cache(CacheError::CacheFull { .. }) => "CacheFull",
        }
    }
}
