use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Context, ResolvedPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MkdirResponse {
    pub path: PathBuf,
    pub relative_path: PathBuf,
}

/// Creates one directory with the configured `dir_mode` (unix); the parent must exist.
pub(super) fn create_dir_with_mode(ctx: &Context, target: &std::path::Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(ctx.config.dir_mode);
    }
    #[cfg(not(unix))]
    let _ = ctx;
    builder.create(target)
}

/// Creates the single directory `name` directly inside `parent`.
pub fn create_directory(ctx: &Context, parent: &ResolvedPath, name: &str) -> Result<MkdirResponse> {
    let name = crate::path_utils::validate_entry_name(name, "folder name")
        .map_err(Error::InvalidPath)?;

    let parent_meta = fs::metadata(parent.as_path())
        .map_err(|err| Error::io_path("metadata", parent.relative(), err))?;
    if !parent_meta.is_dir() {
        return Err(Error::InvalidPath(format!(
            "{} is not a directory",
            parent.relative().display()
        )));
    }

    let target = parent.child(name);
    if target.exists() {
        return Err(Error::AlreadyExists(target.relative().to_path_buf()));
    }

    if let Err(err) = create_dir_with_mode(ctx, target.as_path()) {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            return Err(Error::AlreadyExists(target.relative().to_path_buf()));
        }
        return Err(Error::io_path("create_dir", target.relative(), err));
    }

    tracing::info!(path = %target.relative().display(), "directory created");
    Ok(MkdirResponse {
        relative_path: target.relative().to_path_buf(),
        path: target.into_path_buf(),
    })
}
