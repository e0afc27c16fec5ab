use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, PathFailure, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeleteKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl DeleteKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Other => "other",
        }
    }
}

impl PartialEq<&str> for DeleteKind {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub relative_path: PathBuf,
    #[serde(rename = "type")]
    pub kind: DeleteKind,
    /// Number of filesystem entries removed, the target included.
    pub removed: u64,
}

pub(super) fn unlink_symlink(target: &Path) -> std::io::Result<()> {
    #[cfg(windows)]
    {
        match fs::remove_file(target) {
            Ok(()) => Ok(()),
            // Directory symlinks and junctions need remove_dir on Windows.
            Err(remove_file_err) => match fs::remove_dir(target) {
                Ok(()) => Ok(()),
                Err(_) => Err(remove_file_err),
            },
        }
    }

    #[cfg(not(windows))]
    {
        fs::remove_file(target)
    }
}

/// Accumulated outcome of a bottom-up removal.
#[derive(Debug, Default)]
pub(super) struct RemoveTally {
    pub(super) removed: u64,
    pub(super) failures: Vec<PathFailure>,
}

/// Removes `dir` and everything below it without following symlinks.
///
/// Every entry is attempted even after a sibling fails. A directory is only removed once its
/// whole subtree is gone; otherwise it stays and only the entries that actually failed are
/// recorded. Returns `true` when `dir` itself was removed.
pub(super) fn remove_tree(ctx: &Context, dir: &Path, tally: &mut RemoveTally) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tally
                .failures
                .push(PathFailure::new(ctx.relative_of(dir), err));
            return false;
        }
    };

    let mut subtree_clean = true;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tally
                    .failures
                    .push(PathFailure::new(ctx.relative_of(dir), err));
                subtree_clean = false;
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                tally
                    .failures
                    .push(PathFailure::new(ctx.relative_of(&path), err));
                subtree_clean = false;
                continue;
            }
        };

        if file_type.is_dir() {
            subtree_clean &= remove_tree(ctx, &path, tally);
            continue;
        }

        let removed = if file_type.is_symlink() {
            unlink_symlink(&path)
        } else {
            fs::remove_file(&path)
        };
        match removed {
            Ok(()) => tally.removed += 1,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "failed to remove entry");
                tally
                    .failures
                    .push(PathFailure::new(ctx.relative_of(&path), err));
                subtree_clean = false;
            }
        }
    }

    if !subtree_clean {
        return false;
    }
    match fs::remove_dir(dir) {
        Ok(()) => {
            tally.removed += 1;
            true
        }
        Err(err) => {
            tally
                .failures
                .push(PathFailure::new(ctx.relative_of(dir), err));
            false
        }
    }
}

/// Deletes `target`: unlinks files and symlinks, removes directories recursively.
///
/// A recursive delete that could not remove everything returns [`Error::PartialFailure`] listing
/// exactly the entries that failed.
pub fn delete(ctx: &Context, target: &ResolvedPath) -> Result<DeleteResponse> {
    if target.is_root() {
        return Err(Error::InvalidPath(
            "refusing to delete the root directory".to_string(),
        ));
    }
    let relative = target.relative().to_path_buf();
    let meta = fs::symlink_metadata(target.as_path())
        .map_err(|err| Error::io_path("metadata", &relative, err))?;

    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        DeleteKind::Symlink
    } else if file_type.is_dir() {
        DeleteKind::Directory
    } else if file_type.is_file() {
        DeleteKind::File
    } else {
        DeleteKind::Other
    };

    if kind == DeleteKind::Directory {
        let mut tally = RemoveTally::default();
        remove_tree(ctx, target.as_path(), &mut tally);
        if !tally.failures.is_empty() {
            tracing::warn!(
                path = %relative.display(),
                removed = tally.removed,
                failed = tally.failures.len(),
                "recursive delete left entries behind"
            );
            return Err(Error::PartialFailure {
                op: "delete",
                processed: tally.removed,
                failures: tally.failures,
            });
        }
        tracing::info!(path = %relative.display(), removed = tally.removed, "directory deleted");
        return Ok(DeleteResponse {
            relative_path: relative,
            kind,
            removed: tally.removed,
        });
    }

    let result = if kind == DeleteKind::Symlink {
        unlink_symlink(target.as_path())
    } else {
        fs::remove_file(target.as_path())
    };
    result.map_err(|err| {
        let op = if kind == DeleteKind::Symlink {
            "unlink_symlink"
        } else {
            "remove_file"
        };
        Error::io_path(op, &relative, err)
    })?;

    tracing::info!(path = %relative.display(), kind = kind.as_str(), "entry deleted");
    Ok(DeleteResponse {
        relative_path: relative,
        kind,
        removed: 1,
    })
}
