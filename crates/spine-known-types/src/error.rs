//! Error taxonomy of the known types subsystem.
//!
//! - source-read failures ([`ReadError`]) carry the offending path,
//! - lookups of absent types fail with [`UnknownTypeError`], an expected outcome,
//! - unauthorized extension attempts fail with [`AccessError`] and are never retried,
//! - precondition violations surface before anything is published.

use std::path::{Path, PathBuf};

use thiserror::Error;

// ============================================================================
// Source reading
// ============================================================================

/// A descriptor source (file, directory or archive) could not be read.
///
/// The whole source is rejected: no descriptor sets from it are surfaced.
#[derive(Debug, Error)]
#[error("unreadable descriptor source `{location}`: {kind}")]
pub struct ReadError {
    /// The source passed to the reader.
    pub path: PathBuf,
    /// The file inside a directory, or the archive entry, that failed.
    pub entry: Option<String>,
    location: String,
    #[source]
    pub kind: ReadErrorKind,
}

impl ReadError {
    pub(crate) fn new(path: &Path, kind: impl Into<ReadErrorKind>) -> Self {
        Self {
            path: path.to_path_buf(),
            entry: None,
            location: path.display().to_string(),
            kind: kind.into(),
        }
    }

    pub(crate) fn in_entry(path: &Path, entry: &str, kind: impl Into<ReadErrorKind>) -> Self {
        Self {
            path: path.to_path_buf(),
            entry: Some(entry.to_string()),
            location: format!("{}!{entry}", path.display()),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadErrorKind {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid descriptor set: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("corrupt archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("entry declares {size} bytes, over the {limit} byte limit")]
    Oversized { size: u64, limit: u64 },
}

// ============================================================================
// Catalog construction
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("type `{name}` is declared by both `{first_file}` and `{second_file}`")]
    DuplicateType {
        name: String,
        first_file: String,
        second_file: String,
    },

    #[error("file `{name}` has conflicting definitions across descriptor sources")]
    ConflictingFile { name: String },

    #[error("invalid type URL `{url}`: expected `<prefix>/<type name>`")]
    InvalidTypeUrl { url: String },

    #[error("malformed catalog: {reason}")]
    Malformed { reason: String },
}

// ============================================================================
// Lookup
// ============================================================================

/// The requested type is not present in the current catalog.
///
/// Callers doing speculative lookups should treat this as "not a known
/// type" rather than as a failure of the build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no known type for `{type_name}`")]
pub struct UnknownTypeError {
    pub type_name: String,
}

// ============================================================================
// Authorization
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("`{caller}` may not extend known types, only `{expected}` is allowed to")]
    Unauthorized {
        caller: String,
        expected: &'static str,
    },

    #[error("permit held by `{caller}` was issued by another registry")]
    ForeignRegistry { caller: String },
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("refusing to extend known types with a malformed catalog: {0}")]
    MalformedCatalog(#[source] CatalogError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
