use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One sub-item of a recursive operation that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFailure {
    /// Root-relative path of the failed item.
    pub path: PathBuf,
    pub reason: String,
}

impl PathFailure {
    pub(crate) fn new(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("io error during {op} ({path}): {source}")]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path is outside the sandbox root: {0}")]
    OutsideRoot(PathBuf),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("permission denied during {op}: {path}")]
    PermissionDenied { op: &'static str, path: PathBuf },

    #[error("operation is not permitted: {0}")]
    NotPermitted(String),

    #[error("file is too large ({size_bytes} bytes; max {max_bytes} bytes): {name}")]
    TooLarge {
        name: String,
        size_bytes: u64,
        max_bytes: u64,
    },

    #[error("file type not allowed ({extension:?}): {name}")]
    DisallowedExtension { name: String, extension: String },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} completed with {} failed item(s); {processed} item(s) processed", .failures.len())]
    PartialFailure {
        op: &'static str,
        /// Entries the operation did complete: removed by a delete, created by a copy.
        processed: u64,
        failures: Vec<PathFailure>,
    },

    #[error("move from {from} to {to} across volumes failed: {reason}")]
    CrossVolumeMoveFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
        failures: Vec<PathFailure>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps an OS error raised while operating on `path` (root-relative where possible).
    ///
    /// `NotFound` and `PermissionDenied` are lifted into their own kinds; everything else keeps
    /// the failing syscall name in `IoPath`.
    pub(crate) fn io_path(op: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { op, path },
            _ => Self::IoPath { op, path, source },
        }
    }

    /// Stable machine-readable code, used by the request boundary and the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::IoPath { .. } => "io_path",
            Self::Json(_) => "json",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidPath(_) => "invalid_path",
            Self::OutsideRoot(_) => "outside_root",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotPermitted(_) => "not_permitted",
            Self::TooLarge { .. } => "too_large",
            Self::DisallowedExtension { .. } => "disallowed_extension",
            Self::WriteFailed { .. } => "write_failed",
            Self::PartialFailure { .. } => "partial_failure",
            Self::CrossVolumeMoveFailed { .. } => "cross_volume_move_failed",
        }
    }

    /// Per-item failures carried by recursive operations; empty for every other kind.
    pub fn failures(&self) -> &[PathFailure] {
        match self {
            Self::PartialFailure { failures, .. }
            | Self::CrossVolumeMoveFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}
