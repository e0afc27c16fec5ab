use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, PathFailure, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyResponse {
    pub from: PathBuf,
    pub to: PathBuf,
    pub files_copied: u64,
    pub dirs_created: u64,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub(super) struct CopyTally {
    pub(super) files_copied: u64,
    pub(super) dirs_created: u64,
    pub(super) bytes: u64,
    pub(super) failures: Vec<PathFailure>,
}

impl CopyTally {
    fn processed(&self) -> u64 {
        self.files_copied + self.dirs_created
    }
}

/// Copies the bytes of `source` into a new file at `dest`.
///
/// Content is staged in a temp file next to `dest` and published with a no-clobber persist, so
/// `dest` either does not exist or holds the complete copy. Permission bits follow the source.
pub(super) fn copy_file_contents(ctx: &Context, source: &Path, dest: &Path) -> Result<u64> {
    let source_relative = ctx.relative_of(source);
    let dest_relative = ctx.relative_of(dest);
    let parent = dest.parent().ok_or_else(|| {
        Error::InvalidPath(format!(
            "{} has no parent directory",
            dest_relative.display()
        ))
    })?;

    let mut input =
        fs::File::open(source).map_err(|err| Error::io_path("open", &source_relative, err))?;
    let source_meta = input
        .metadata()
        .map_err(|err| Error::io_path("metadata", &source_relative, err))?;
    if !source_meta.is_file() {
        return Err(Error::InvalidPath(format!(
            "{} is not a regular file",
            source_relative.display()
        )));
    }

    let mut tmp_file = tempfile::Builder::new()
        .prefix(".safe-fm.")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| Error::io_path("create_temp", &dest_relative, err))?;
    let bytes = std::io::copy(&mut input, tmp_file.as_file_mut())
        .map_err(|err| Error::io_path("copy", &dest_relative, err))?;
    tmp_file
        .as_file()
        .sync_all()
        .map_err(|err| Error::io_path("sync", &dest_relative, err))?;
    fs::set_permissions(tmp_file.path(), source_meta.permissions())
        .map_err(|err| Error::io_path("set_permissions", &dest_relative, err))?;

    tmp_file.persist_noclobber(dest).map_err(|err| {
        if err.error.kind() == std::io::ErrorKind::AlreadyExists {
            Error::AlreadyExists(dest_relative.clone())
        } else {
            Error::io_path("persist", &dest_relative, err.error)
        }
    })?;
    Ok(bytes)
}

/// Recreates `source` at `dest` top-down. `dest` itself must not exist yet.
///
/// Only a failure to create `dest` aborts; every other failure is recorded and the walk moves on.
fn copy_tree(ctx: &Context, source: &Path, dest: &Path, tally: &mut CopyTally) -> Result<()> {
    super::mkdir::create_dir_with_mode(ctx, dest).map_err(|err| {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            Error::AlreadyExists(ctx.relative_of(dest))
        } else {
            Error::io_path("create_dir", ctx.relative_of(dest), err)
        }
    })?;
    tally.dirs_created += 1;

    let entries = match fs::read_dir(source) {
        Ok(entries) => entries,
        Err(err) => {
            tally
                .failures
                .push(PathFailure::new(ctx.relative_of(source), err));
            return Ok(());
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tally
                    .failures
                    .push(PathFailure::new(ctx.relative_of(source), err));
                continue;
            }
        };
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                tally
                    .failures
                    .push(PathFailure::new(ctx.relative_of(&from), err));
                continue;
            }
        };

        if file_type.is_symlink() {
            tally.failures.push(PathFailure::new(
                ctx.relative_of(&from),
                "symlinks are not copied",
            ));
        } else if file_type.is_dir() {
            if let Err(err) = copy_tree(ctx, &from, &to, tally) {
                tally
                    .failures
                    .push(PathFailure::new(ctx.relative_of(&from), err));
            }
        } else if file_type.is_file() {
            match copy_file_contents(ctx, &from, &to) {
                Ok(bytes) => {
                    tally.files_copied += 1;
                    tally.bytes += bytes;
                }
                Err(err) => {
                    tracing::debug!(path = %from.display(), error = %err, "failed to copy file");
                    tally
                        .failures
                        .push(PathFailure::new(ctx.relative_of(&from), err));
                }
            }
        } else {
            tally.failures.push(PathFailure::new(
                ctx.relative_of(&from),
                "not a regular file or directory",
            ));
        }
    }
    Ok(())
}

/// Copies whatever `source` is (file or directory tree) to the free path `dest`.
///
/// Returns the tally even when some items failed; callers decide how to report them.
pub(super) fn copy_entry(ctx: &Context, source: &Path, dest: &Path) -> Result<CopyTally> {
    let meta =
        fs::metadata(source).map_err(|err| Error::io_path("metadata", ctx.relative_of(source), err))?;
    let mut tally = CopyTally::default();
    if meta.is_dir() {
        copy_tree(ctx, source, dest, &mut tally)?;
    } else {
        tally.bytes = copy_file_contents(ctx, source, dest)?;
        tally.files_copied = 1;
    }
    Ok(tally)
}

/// Follows a leaf symlink to the entry it names; the resolver already proved the target is
/// inside the root.
pub(super) fn effective_source(ctx: &Context, from: &ResolvedPath) -> Result<PathBuf> {
    let canonical = from
        .as_path()
        .canonicalize()
        .map_err(|err| Error::io_path("canonicalize", from.relative(), err))?;
    if !crate::path_utils::is_within_root(&canonical, ctx.root()) {
        return Err(Error::OutsideRoot(from.relative().to_path_buf()));
    }
    Ok(canonical)
}

/// Copies `from` to the new path `to`.
pub fn copy(ctx: &Context, from: &ResolvedPath, to: &ResolvedPath) -> Result<CopyResponse> {
    if !from.exists() {
        return Err(Error::NotFound(from.relative().to_path_buf()));
    }
    if to.exists() {
        return Err(Error::AlreadyExists(to.relative().to_path_buf()));
    }

    let source = effective_source(ctx, from)?;
    if crate::path_utils::is_within_root(to.as_path(), &source) {
        return Err(Error::InvalidPath(format!(
            "cannot copy {} into itself ({})",
            from.relative().display(),
            to.relative().display()
        )));
    }

    let tally = copy_entry(ctx, &source, to.as_path())?;
    if !tally.failures.is_empty() {
        tracing::warn!(
            from = %from.relative().display(),
            to = %to.relative().display(),
            failed = tally.failures.len(),
            "copy finished with failures"
        );
        return Err(Error::PartialFailure {
            op: "copy",
            processed: tally.processed(),
            failures: tally.failures,
        });
    }

    tracing::info!(
        from = %from.relative().display(),
        to = %to.relative().display(),
        files = tally.files_copied,
        bytes = tally.bytes,
        "copied"
    );
    Ok(CopyResponse {
        from: from.relative().to_path_buf(),
        to: to.relative().to_path_buf(),
        files_copied: tally.files_copied,
        dirs_created: tally.dirs_created,
        bytes: tally.bytes,
    })
}
