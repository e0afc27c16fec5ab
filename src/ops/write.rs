use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteFileResponse {
    pub relative_path: PathBuf,
    pub bytes_written: u64,
    /// `false` when the content of an existing file was replaced.
    pub created: bool,
}

#[cfg(unix)]
fn same_directory(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_directory(_a: &fs::Metadata, _b: &fs::Metadata) -> bool {
    true
}

fn parent_snapshot(parent: &Path, relative: &Path) -> Result<fs::Metadata> {
    let meta = fs::symlink_metadata(parent)
        .map_err(|err| Error::io_path("symlink_metadata", relative, err))?;
    if meta.file_type().is_symlink() || !meta.is_dir() {
        return Err(Error::InvalidPath(format!(
            "parent directory of {} changed during write",
            relative.display()
        )));
    }
    Ok(meta)
}

fn write_failed(relative: &Path, source: std::io::Error) -> Error {
    Error::WriteFailed {
        path: relative.to_path_buf(),
        source,
    }
}

/// Writes `content` into a synced temp file inside `parent`, ready to be published.
fn stage_content(
    parent: &Path,
    relative: &Path,
    content: &[u8],
    permissions: Option<fs::Permissions>,
) -> Result<tempfile::NamedTempFile> {
    let mut tmp_file = tempfile::Builder::new()
        .prefix(".safe-fm-write.")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| write_failed(relative, err))?;
    tmp_file
        .as_file_mut()
        .write_all(content)
        .map_err(|err| write_failed(relative, err))?;

    match permissions {
        Some(perms) => tmp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|err| write_failed(relative, err))?,
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tmp_file
                    .as_file()
                    .set_permissions(fs::Permissions::from_mode(super::upload::NEW_FILE_MODE))
                    .map_err(|err| write_failed(relative, err))?;
            }
        }
    }
    tmp_file
        .as_file()
        .sync_all()
        .map_err(|err| write_failed(relative, err))?;
    Ok(tmp_file)
}

/// Saves `content` as the whole content of the file at `path`.
///
/// An existing regular file is replaced atomically and keeps its permission bits. A missing
/// file is created, which needs its parent directory to exist already (the resolver reports
/// `NotFound` otherwise). Symlinks, directories and anything over `limits.max_write_bytes` are
/// refused, as are names on the upload deny list.
pub fn write_file(ctx: &Context, path: &ResolvedPath, content: &[u8]) -> Result<WriteFileResponse> {
    let relative = path.relative().to_path_buf();
    if path.is_root() {
        return Err(Error::InvalidPath(
            "refusing to write to the root directory".to_string(),
        ));
    }

    let max_bytes = ctx.config.limits.max_write_bytes;
    let bytes_written = content.len() as u64;
    if bytes_written > max_bytes {
        return Err(Error::TooLarge {
            name: relative.display().to_string(),
            size_bytes: bytes_written,
            max_bytes,
        });
    }

    let name = path
        .as_path()
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::InvalidPath(format!("invalid file name: {}", relative.display()))
        })?;
    super::upload::check_denied_extension(ctx, name)?;

    let parent = path.as_path().parent().ok_or_else(|| {
        Error::InvalidPath(format!("{} has no parent directory", relative.display()))
    })?;
    let parent_meta = parent_snapshot(parent, &relative)?;

    let existing = match fs::symlink_metadata(path.as_path()) {
        Ok(meta) => Some(meta),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return Err(Error::io_path("metadata", &relative, err)),
    };
    let permissions = match &existing {
        None => None,
        Some(meta) if meta.file_type().is_symlink() => {
            return Err(Error::InvalidPath(format!(
                "path {} is a symlink",
                relative.display()
            )));
        }
        Some(meta) if meta.is_dir() => {
            return Err(Error::InvalidPath(format!(
                "path {} is a directory",
                relative.display()
            )));
        }
        Some(meta) if !meta.is_file() => {
            return Err(Error::InvalidPath(format!(
                "path {} is not a regular file",
                relative.display()
            )));
        }
        Some(meta) => Some(meta.permissions()),
    };

    let tmp_file = stage_content(parent, &relative, content, permissions)?;
    if !same_directory(&parent_meta, &parent_snapshot(parent, &relative)?) {
        return Err(Error::InvalidPath(format!(
            "parent directory of {} changed during write",
            relative.display()
        )));
    }

    let created = existing.is_none();
    if created {
        tmp_file.persist_noclobber(path.as_path()).map_err(|err| {
            if err.error.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists(relative.clone())
            } else {
                write_failed(&relative, err.error)
            }
        })?;
    } else {
        tmp_file
            .persist(path.as_path())
            .map_err(|err| write_failed(&relative, err.error))?;
    }

    tracing::info!(path = %relative.display(), bytes_written, created, "file saved");
    Ok(WriteFileResponse {
        relative_path: relative,
        bytes_written,
        created,
    })
}
