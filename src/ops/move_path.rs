use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, PathFailure, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveMethod {
    /// A single rename on one volume.
    Rename,
    /// Cross-volume fallback: full copy, then removal of the source.
    CopyDelete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    pub from: PathBuf,
    pub to: PathBuf,
    pub method: MoveMethod,
}

fn remove_any(ctx: &Context, path: &Path) -> Vec<PathFailure> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => return vec![PathFailure::new(ctx.relative_of(path), err)],
    };
    if meta.is_dir() {
        let mut tally = super::delete::RemoveTally::default();
        super::delete::remove_tree(ctx, path, &mut tally);
        return tally.failures;
    }
    let removed = if meta.file_type().is_symlink() {
        super::delete::unlink_symlink(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => Vec::new(),
        Err(err) => vec![PathFailure::new(ctx.relative_of(path), err)],
    }
}

/// Moves `source` to `dest` by copying and then deleting the source.
///
/// If the copy is incomplete, whatever reached `dest` is removed again and the source stays
/// untouched. If the copy completes but the source cannot be fully removed, `dest` is kept so no
/// data is lost, and the error lists the source entries left behind.
pub(super) fn copy_then_delete(ctx: &Context, source: &Path, dest: &Path) -> Result<()> {
    let from = ctx.relative_of(source);
    let to = ctx.relative_of(dest);

    let source_meta =
        fs::symlink_metadata(source).map_err(|err| Error::io_path("metadata", &from, err))?;
    if source_meta.file_type().is_symlink() {
        return Err(Error::CrossVolumeMoveFailed {
            from,
            to,
            reason: "symlinks cannot be moved across volumes".to_string(),
            failures: Vec::new(),
        });
    }

    let copy_failures = match super::copy::copy_entry(ctx, source, dest) {
        Ok(tally) => tally.failures,
        Err(err) => vec![PathFailure::new(from.clone(), err)],
    };
    if !copy_failures.is_empty() {
        let cleanup_failures = remove_any(ctx, dest);
        if !cleanup_failures.is_empty() {
            tracing::warn!(
                to = %to.display(),
                left = cleanup_failures.len(),
                "could not remove partial copy after failed cross-volume move"
            );
        }
        let mut failures = copy_failures;
        failures.extend(cleanup_failures);
        return Err(Error::CrossVolumeMoveFailed {
            from,
            to,
            reason: "copy to the destination volume failed; source left in place".to_string(),
            failures,
        });
    }

    let leftovers = remove_any(ctx, source);
    if !leftovers.is_empty() {
        tracing::warn!(
            from = %from.display(),
            left = leftovers.len(),
            "source not fully removed after cross-volume copy"
        );
        return Err(Error::CrossVolumeMoveFailed {
            from,
            to,
            reason: "copied, but the source could not be fully removed; destination kept"
                .to_string(),
            failures: leftovers,
        });
    }
    Ok(())
}

/// Moves `from` to the free path `to`, possibly in another directory.
pub fn move_path(ctx: &Context, from: &ResolvedPath, to: &ResolvedPath) -> Result<MoveResponse> {
    if from.is_root() {
        return Err(Error::InvalidPath(
            "refusing to move the root directory".to_string(),
        ));
    }
    if !from.exists() {
        return Err(Error::NotFound(from.relative().to_path_buf()));
    }
    if to.exists() {
        return Err(Error::AlreadyExists(to.relative().to_path_buf()));
    }

    let meta = fs::symlink_metadata(from.as_path())
        .map_err(|err| Error::io_path("metadata", from.relative(), err))?;
    if meta.is_dir() && crate::path_utils::is_within_root(to.as_path(), from.as_path()) {
        return Err(Error::InvalidPath(format!(
            "cannot move {} into itself ({})",
            from.relative().display(),
            to.relative().display()
        )));
    }

    let method = match crate::platform::rename::rename_no_replace(from.as_path(), to.as_path()) {
        Ok(()) => MoveMethod::Rename,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(Error::AlreadyExists(to.relative().to_path_buf()));
        }
        Err(err) if crate::platform::rename::is_cross_device(&err) => {
            tracing::warn!(
                from = %from.relative().display(),
                to = %to.relative().display(),
                "rename crosses volumes; falling back to copy and delete"
            );
            copy_then_delete(ctx, from.as_path(), to.as_path())?;
            MoveMethod::CopyDelete
        }
        Err(err) => return Err(Error::io_path("rename", from.relative(), err)),
    };

    tracing::info!(
        from = %from.relative().display(),
        to = %to.relative().display(),
        ?method,
        "moved"
    );
    Ok(MoveResponse {
        from: from.relative().to_path_buf(),
        to: to.relative().to_path_buf(),
        method,
    })
}
